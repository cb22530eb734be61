use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "proofmark", version, about = "proofmark CLI")]
pub struct Cli {
    /// Emit JSON output on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log filter for stderr diagnostics (overrides RUST_LOG).
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Signing key management.
    Keys {
        #[command(subcommand)]
        action: KeysCommand,
    },

    /// Issue a signed proof for a file and store it in the database.
    Issue {
        /// File to prove.
        path: String,

        /// Subject type.
        #[arg(long = "type", default_value = "file")]
        subject_type: String,

        #[arg(long, default_value = "default")]
        namespace: String,

        /// Subject id (default: the file name).
        #[arg(long)]
        id: Option<String>,

        /// Metadata entry, repeatable: --meta key=value
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,

        /// JSON object file merged into metadata.
        #[arg(long)]
        metadata_file: Option<String>,

        #[arg(long)]
        user: Option<String>,
    },

    /// Publish pending proofs as the next snapshot batch.
    Publish {
        /// Maximum proofs per batch.
        #[arg(long, default_value_t = 1000)]
        max: usize,

        /// Re-run publication of an existing batch instead.
        #[arg(long)]
        batch: Option<u64>,
    },

    /// Verify a hash, a local file, or query a remote API.
    Verify {
        /// Hex sha256 to verify.
        hash: Option<String>,

        /// Hash this file and verify the digest.
        #[arg(long)]
        file: Option<String>,

        /// Base URL of a proofmark API (e.g. https://proofs.example.com).
        #[arg(long)]
        remote: Option<String>,
    },

    /// Run a recovery audit.
    Audit {
        #[arg(long)]
        sample: Option<usize>,

        /// Deterministic sample (lowest ids first).
        #[arg(long)]
        reproducible: bool,

        #[arg(long)]
        max_errors: Option<usize>,

        #[arg(long)]
        concurrency: Option<usize>,

        /// Comma-separated: database,object-store
        #[arg(long)]
        sources: Option<String>,

        /// Skip cross-mirror validation.
        #[arg(long)]
        no_mirrors: bool,
    },

    /// Check configuration and storage reachability.
    Doctor,
}

#[derive(Subcommand, Debug, Clone)]
pub enum KeysCommand {
    /// Generate an Ed25519 key pair as PKCS#8 / SPKI PEM files.
    Generate {
        /// Output directory.
        #[arg(long, default_value = ".")]
        out: String,

        /// File name stem: <name>.pem and <name>.pub.pem
        #[arg(long, default_value = "signing")]
        name: String,
    },

    /// Print the fingerprint of a private or public key PEM file.
    Fingerprint { path: String },
}
