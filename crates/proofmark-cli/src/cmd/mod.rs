use anyhow::Result;

use crate::args::{Cli, Command};

mod audit;
mod doctor;
mod issue;
mod keys;
mod publish;
mod verify;

pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Keys { action } => keys::run(action).await,
        Command::Issue {
            path,
            subject_type,
            namespace,
            id,
            meta,
            metadata_file,
            user,
        } => {
            issue::run(issue::IssueArgs {
                path,
                subject_type,
                namespace,
                id,
                meta,
                metadata_file,
                user,
            })
            .await
        }
        Command::Publish { max, batch } => publish::run(max, batch).await,
        Command::Verify { hash, file, remote } => verify::run(hash.as_deref(), file.as_deref(), remote.as_deref()).await,
        Command::Audit {
            sample,
            reproducible,
            max_errors,
            concurrency,
            sources,
            no_mirrors,
        } => {
            audit::run(audit::AuditArgs {
                sample,
                reproducible,
                max_errors,
                concurrency,
                sources,
                no_mirrors,
            })
            .await
        }
        Command::Doctor => doctor::run().await,
    }
}
