//! CLI command definitions

use clap::{Parser, Subcommand};
use roomkey::config::{TokenScheme, TokenSchemes};
use roomkey::roles::AppRole;

#[derive(Parser)]
#[command(name = "roomkey")]
#[command(about = "Signed access tokens for media and signaling channels", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Application id (32 hex characters)
    #[arg(long, env = "ROOMKEY_APP_ID", global = true)]
    pub app_id: Option<String>,

    /// Application certificate used as the signing key
    #[arg(long, env = "ROOMKEY_APP_CERTIFICATE", global = true, hide_env_values = true)]
    pub app_certificate: Option<String>,

    /// Media token format: 006 or 007 (007 needs a hex certificate)
    #[arg(long, env = "ROOMKEY_MEDIA_SCHEME", global = true, default_value = "007")]
    pub media_scheme: TokenScheme,

    /// Signaling token format: 006 or 007
    #[arg(long, env = "ROOMKEY_SIGNALING_SCHEME", global = true, default_value = "006")]
    pub signaling_scheme: TokenScheme,

    /// Database URL; in-memory stores are used when unset
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,
}

impl Cli {
    pub fn schemes(&self) -> TokenSchemes {
        TokenSchemes::new(self.media_scheme, self.signaling_scheme)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    ///
    /// Without a database URL, form tokens live in memory only and
    /// `form-token` cannot seed them, so the scheduling form is unusable.
    Serve {
        /// Address to bind to
        #[arg(short, long, env = "ROOMKEY_BIND", default_value = "0.0.0.0:8080")]
        bind: String,

        /// Key that token requests must present
        #[arg(long, env = "ROOMKEY_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Directory for uploaded cover files
        #[arg(long, env = "ROOMKEY_UPLOAD_DIR", default_value = "uploads")]
        upload_dir: String,

        /// Time zone recorded on scheduled sessions
        #[arg(long, env = "ROOMKEY_TIMEZONE", default_value = "America/Sao_Paulo")]
        timezone: String,

        /// Object key prefix for cover uploads
        #[arg(long, env = "ROOMKEY_COVER_PREFIX", default_value = "online")]
        cover_prefix: String,

        /// Prefix of generated session ids
        #[arg(long, env = "ROOMKEY_SESSION_PREFIX", default_value = "session")]
        session_prefix: String,
    },

    /// Issue a media channel token
    ///
    /// Examples:
    ///   roomkey rtc room42 --uid 7 --role host
    ///   roomkey rtc room42 --role participant --expire-seconds 600
    Rtc {
        /// Channel name
        channel: String,

        /// Numeric user id; 0 lets the media service assign one
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        uid: i64,

        /// host, cohost or participant
        #[arg(long, default_value = "participant")]
        role: AppRole,

        /// Validity in seconds (60..=86400)
        #[arg(long, default_value_t = 3600, allow_negative_numbers = true)]
        expire_seconds: i64,
    },

    /// Issue a signaling login token
    ///
    /// Examples:
    ///   roomkey rtm --account alice
    ///   roomkey rtm --uid 7
    Rtm {
        /// Signaling account; defaults to the uid
        #[arg(long)]
        account: Option<String>,

        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        uid: i64,

        /// Validity in seconds (60..=86400)
        #[arg(long, default_value_t = 3600, allow_negative_numbers = true)]
        expire_seconds: i64,
    },

    /// Verify a token and print its contents
    ///
    /// `006` tokens only carry checksums of channel and uid, so those must
    /// be given. For signaling tokens pass the account as the channel.
    Verify {
        token: String,

        /// Channel (or signaling account) the token was issued for
        #[arg(long)]
        channel: Option<String>,

        /// Uid string the token was issued for; empty for uid 0 and signaling
        #[arg(long, default_value = "")]
        uid: String,
    },

    /// Create a single-use scheduling form token
    FormToken {
        /// Subject to prefill
        #[arg(long, default_value = "")]
        subject: String,

        /// Date to prefill (YYYY-MM-DD)
        #[arg(long, default_value = "")]
        date: String,

        /// Time to prefill (HH:MM)
        #[arg(long, default_value = "")]
        time: String,

        /// Email recorded as the session creator
        #[arg(long, default_value = "")]
        sender_email: String,

        /// Hours until the token expires
        #[arg(long, default_value_t = 72)]
        expire_hours: i64,
    },
}
