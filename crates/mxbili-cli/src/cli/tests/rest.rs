//! Tests for set-port, set-sessdata, poster, config and completions.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use clap_complete::Shell;

#[test]
fn cli_parse_set_port() {
    match parse(&["mxbili", "set-port", "2234"]) {
        CliCommand::SetPort { port } => assert_eq!(port, 2234),
        _ => panic!("expected SetPort"),
    }
    assert!(Cli::try_parse_from(["mxbili", "set-port", "99999"]).is_err());
    assert!(Cli::try_parse_from(["mxbili", "set-port"]).is_err());
}

#[test]
fn cli_parse_set_sessdata_allows_empty() {
    match parse(&["mxbili", "set-sessdata", ""]) {
        CliCommand::SetSessdata { value } => assert!(value.is_empty()),
        _ => panic!("expected SetSessdata"),
    }
}

#[test]
fn cli_parse_set_sessdata_rejects_line_breaks() {
    assert!(Cli::try_parse_from(["mxbili", "set-sessdata", "tok\nport 80"]).is_err());
    assert!(Cli::try_parse_from(["mxbili", "set-sessdata", "tok\r"]).is_err());
}

#[test]
fn cli_parse_poster() {
    match parse(&["mxbili", "poster", "BV1GJ411x7h7"]) {
        CliCommand::Poster { id, port } => {
            assert_eq!(id, "BV1GJ411x7h7");
            assert!(port.is_none());
        }
        _ => panic!("expected Poster"),
    }
    match parse(&["mxbili", "poster", "av170001", "--port", "3000"]) {
        CliCommand::Poster { port, .. } => assert_eq!(port, Some(3000)),
        _ => panic!("expected Poster with --port"),
    }
}

#[test]
fn cli_parse_config() {
    assert!(matches!(parse(&["mxbili", "config"]), CliCommand::Config));
}

#[test]
fn cli_parse_completions() {
    match parse(&["mxbili", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, Shell::Bash),
        _ => panic!("expected Completions"),
    }
}
