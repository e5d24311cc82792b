//! Depfile parsers (§4.H): pure functions from file contents to a list of filesystem paths.
//! GCC `.d` files are POSIX-only; MSVC `/sourceDependencies` JSON is Windows-only, selected the
//! same way the source picks between them (`os.name`), via `cfg!(windows)`.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DepfileError {
    #[error("malformed MSVC depfile: {0}")]
    Json(#[from] serde_json::Error),
}

/// GCC `.d` form: first whitespace-delimited token is the target and is discarded; remaining
/// tokens are dependencies; line-continuation backslashes are stripped.
pub fn parse_gcc(contents: &str) -> Vec<PathBuf> {
    let tokens: Vec<&str> = contents.split_whitespace().collect();
    tokens
        .into_iter()
        .skip(1)
        .filter(|tok| *tok != "\\")
        .map(PathBuf::from)
        .collect()
}

#[derive(Deserialize)]
struct MsvcDepfile {
    #[serde(rename = "Data")]
    data: MsvcData,
}

#[derive(Deserialize)]
struct MsvcData {
    #[serde(rename = "Includes")]
    includes: Vec<String>,
}

/// MSVC `/sourceDependencies` JSON: dependencies are the list at `Data.Includes`.
pub fn parse_msvc(contents: &str) -> Result<Vec<PathBuf>, DepfileError> {
    let parsed: MsvcDepfile = serde_json::from_str(contents)?;
    Ok(parsed.data.includes.into_iter().map(PathBuf::from).collect())
}

/// Parses `contents` using whichever depfile format this platform's compilers emit.
pub fn parse(contents: &str) -> Result<Vec<PathBuf>, DepfileError> {
    if cfg!(windows) {
        parse_msvc(contents)
    } else {
        Ok(parse_gcc(contents))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_gcc_depfile() {
        let contents = "main.o: main.c header.h \\\n  other.h\n";
        let deps = parse_gcc(contents);
        assert_eq!(
            deps,
            vec![
                PathBuf::from("main.c"),
                PathBuf::from("header.h"),
                PathBuf::from("other.h"),
            ]
        );
    }

    #[test]
    fn test_gcc_depfile_single_line() {
        let deps = parse_gcc("main.o: main.c header.h");
        assert_eq!(deps, vec![PathBuf::from("main.c"), PathBuf::from("header.h")]);
    }

    #[test]
    fn test_msvc_depfile() {
        let contents = r#"{"Version":"1.2","Data":{"Source":"main.c","Includes":["header.h","other.h"]}}"#;
        let deps = parse_msvc(contents).unwrap();
        assert_eq!(deps, vec![PathBuf::from("header.h"), PathBuf::from("other.h")]);
    }

    #[test]
    fn test_msvc_depfile_malformed() {
        assert!(parse_msvc("not json").is_err());
    }
}
