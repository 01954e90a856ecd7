//! # 명령줄 인자
//!
//! 인자 없이 실행하면 API 서버를 띄웁니다.
//!
//! ```text
//! cvtailor                                       # = cvtailor serve
//! cvtailor import-legacy web/users.json v1/      # 파일 기반 데이터 가져오기
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cvtailor")]
#[command(about = "Tailor a master CV to job postings", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server
    Serve,
    /// Import users, variant folders and master CVs from the file-based layout
    ImportLegacy {
        /// users.json holding `{ "<id>": { "email", "password_hash" } }`
        users: PathBuf,

        /// Directory with one folder per variant (each with an `.owner` marker)
        /// and `user_<id>_master.tex` files
        variants: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_means_serve() {
        let cli = Cli::try_parse_from(["cvtailor"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn import_legacy_takes_two_paths() {
        let cli = Cli::try_parse_from(["cvtailor", "import-legacy", "web/users.json", "v1"]).unwrap();

        match cli.command {
            Some(Commands::ImportLegacy { users, variants }) => {
                assert_eq!(users, PathBuf::from("web/users.json"));
                assert_eq!(variants, PathBuf::from("v1"));
            }
            other => panic!("Expected import-legacy, got {:?}", other),
        }
    }

    #[test]
    fn import_legacy_requires_the_variants_dir() {
        assert!(Cli::try_parse_from(["cvtailor", "import-legacy", "users.json"]).is_err());
    }
}
