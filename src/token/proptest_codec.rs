//! Property-based tests for the token codecs
//!
//! Packing must round-trip for every valid input, and a token must not
//! survive a corrupted byte as a different accepted token.

use base64::{engine::general_purpose::STANDARD, Engine};
use proptest::prelude::*;
use proptest::sample::Index;

use crate::config::Credentials;
use crate::error::VerifyError;
use crate::token::message::Message;
use crate::token::packing::{PackError, Packer, Unpacker};
use crate::token::service::{Service, MAX_FIELD_BYTES};
use crate::token::{access_token, access_token2, AccessToken, AccessToken2, Privilege, PrivilegeSet};

const APP_ID: &str = "970CA35de60c44645bbae8a215061b33";
const APP_CERT: &str = "5CFd2fd1755d40ecb72977518be15d3b";
const NOW: u32 = 1_700_000_000;

const RTC_PRIVILEGES: [Privilege; 4] = [
    Privilege::JoinChannel,
    Privilege::PublishAudioStream,
    Privilege::PublishVideoStream,
    Privilege::PublishDataStream,
];

fn privilege_set() -> impl Strategy<Value = PrivilegeSet> {
    prop::collection::vec((0..Privilege::ALL.len(), any::<u32>()), 0..20).prop_map(|grants| {
        let mut set = PrivilegeSet::new();
        for (i, expire_at) in grants {
            set.grant(Privilege::ALL[i], expire_at);
        }
        set
    })
}

/// ASCII or arbitrary printable text, never over the field bound
fn field() -> impl Strategy<Value = String> {
    let ascii = proptest::string::string_regex(&format!("[a-zA-Z0-9 _.-]{{0,{}}}", MAX_FIELD_BYTES))
        .expect("valid regex");
    prop_oneof![ascii, proptest::string::string_regex("\\PC{0,64}").expect("valid regex")]
}

fn rtc_service() -> impl Strategy<Value = Service> {
    (
        field(),
        field(),
        prop::collection::vec((0..RTC_PRIVILEGES.len(), any::<u32>()), 0..8),
    )
        .prop_map(|(channel, uid, grants)| {
            let mut svc = Service::rtc(&channel, &uid);
            for (i, expire) in grants {
                svc.add_privilege(RTC_PRIVILEGES[i], expire).unwrap();
            }
            svc
        })
}

fn rtm_service() -> impl Strategy<Value = Service> {
    (field(), prop::option::of(any::<u32>())).prop_map(|(user_id, login)| {
        let mut svc = Service::rtm(&user_id);
        if let Some(expire) = login {
            svc.add_privilege(Privilege::Login, expire).unwrap();
        }
        svc
    })
}

fn credentials() -> Credentials {
    Credentials::new(APP_ID, APP_CERT).unwrap()
}

proptest! {
    /// Property: maps unpack to the map that was packed.
    #[test]
    fn prop_map_round_trip(map in prop::collection::btree_map(any::<u16>(), any::<u32>(), 0..64)) {
        let mut p = Packer::new();
        p.map_u32(&map).unwrap();
        let buf = p.finish();
        prop_assert_eq!(buf.len(), 2 + map.len() * 6);

        let mut u = Unpacker::new(&buf);
        prop_assert_eq!(u.map_u32().unwrap(), map);
        prop_assert!(u.is_exhausted());
    }

    /// Property: strings unpack unchanged, followed by whatever came next.
    #[test]
    fn prop_string_round_trip(s in "\\PC{0,256}", tail in any::<u32>()) {
        let mut p = Packer::new();
        p.string(&s).unwrap();
        p.u32(tail);
        let buf = p.finish();

        let mut u = Unpacker::new(&buf);
        prop_assert_eq!(u.string().unwrap(), s);
        prop_assert_eq!(u.u32().unwrap(), tail);
        prop_assert!(u.is_exhausted());
    }

    /// Property: messages unpack to the message that was packed.
    #[test]
    fn prop_message_round_trip(salt in any::<u32>(), ts in any::<u32>(), privileges in privilege_set()) {
        let msg = Message::new(salt, ts, privileges);
        let bytes = msg.pack().unwrap();
        prop_assert_eq!(Message::unpack(&bytes).unwrap(), Some(msg));
    }

    /// Property: services of either type unpack unchanged.
    #[test]
    fn prop_service_round_trip(svc in prop_oneof![rtc_service(), rtm_service()]) {
        let bytes = svc.pack().unwrap();
        let mut u = Unpacker::new(&bytes);
        prop_assert_eq!(Service::unpack(&mut u).unwrap(), svc);
        prop_assert!(u.is_exhausted());
    }

    /// Property: decoding arbitrary bytes fails cleanly instead of panicking.
    #[test]
    fn prop_unpack_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = Message::unpack(&bytes);
        let _ = Service::unpack(&mut Unpacker::new(&bytes));
        let _ = access_token::DecodedToken::parse(&format!("{}{}{}", access_token::VERSION, APP_ID, STANDARD.encode(&bytes)));
        let _ = access_token2::DecodedToken2::parse(&format!("{}{}", access_token2::VERSION, STANDARD.encode(&bytes)));
    }

    /// Property: flipping any bits of one `006` content byte is rejected.
    #[test]
    fn prop_v006_byte_flip_rejected(
        channel in "[a-zA-Z0-9_-]{1,64}",
        uid in any::<u32>(),
        salt in 1u32..=99_999_999,
        at in any::<Index>(),
        mask in 1u8..=255,
    ) {
        let creds = credentials();
        let uid = uid.to_string();
        let mut token = AccessToken::new(&creds, &channel, &uid, NOW, salt);
        token.add_privilege(Privilege::JoinChannel, NOW + 3600);
        token.add_privilege(Privilege::PublishAudioStream, NOW + 3600);
        let text = token.build().unwrap();

        let prefix_len = access_token::VERSION.len() + access_token::APP_ID_LEN;
        let mut content = STANDARD.decode(&text[prefix_len..]).unwrap();
        let i = at.index(content.len());
        content[i] ^= mask;
        let forged = format!("{}{}", &text[..prefix_len], STANDARD.encode(&content));

        let result = access_token::verify(&forged, APP_CERT, &channel, &uid, NOW);
        prop_assert!(
            matches!(result, Err(VerifyError::BadSignature) | Err(VerifyError::MalformedToken(_))),
            "byte {} ^ {:#04x} gave {:?}", i, mask, result
        );
    }

    /// Property: a flipped `007` blob byte is rejected, or inflates to the
    /// identical signed content (zlib level bits and deflate padding carry
    /// no data).
    #[test]
    fn prop_v007_byte_flip_never_yields_another_token(
        svc in rtc_service(),
        salt in 1u32..=99_999_999,
        at in any::<Index>(),
        mask in 1u8..=255,
    ) {
        let creds = credentials();
        let mut token = AccessToken2::new(&creds, NOW, 3600, salt);
        token.add_service(svc);
        let text = token.build().unwrap();
        let original = access_token2::DecodedToken2::parse(&text).unwrap();

        let mut compressed = STANDARD.decode(&text[access_token2::VERSION.len()..]).unwrap();
        let i = at.index(compressed.len());
        compressed[i] ^= mask;
        let forged = format!("{}{}", access_token2::VERSION, STANDARD.encode(&compressed));

        match access_token2::verify(&forged, APP_CERT, NOW) {
            Err(VerifyError::BadSignature) | Err(VerifyError::MalformedToken(_)) => {}
            Ok(decoded) => {
                prop_assert_eq!(decoded.signature, original.signature);
                prop_assert_eq!(decoded.signing_info, original.signing_info);
            }
            Err(other) => prop_assert!(false, "byte {} ^ {:#04x} gave {:?}", i, mask, other),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: byte strings round-trip all the way to the u16 bound.
    #[test]
    fn prop_bytes_round_trip(data in prop::collection::vec(any::<u8>(), 0..=u16::MAX as usize)) {
        let mut p = Packer::new();
        p.bytes(&data).unwrap();
        let buf = p.finish();
        prop_assert_eq!(buf.len(), 2 + data.len());

        let mut u = Unpacker::new(&buf);
        prop_assert_eq!(u.bytes().unwrap(), data.as_slice());
        prop_assert!(u.is_exhausted());
    }

    /// Property: anything longer than the u16 bound is refused.
    #[test]
    fn prop_bytes_over_bound_rejected(extra in 1usize..1024) {
        let data = vec![0u8; u16::MAX as usize + extra];
        let mut p = Packer::new();
        prop_assert_eq!(p.bytes(&data).unwrap_err(), PackError::Oversized(data.len()));
        prop_assert!(p.is_empty());
    }
}
