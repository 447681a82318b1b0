//! CLI parse tests.

use clap::Parser;

use super::{Cli, CliCommand};

#[test]
fn parse_serve_with_port() {
    let cli = Cli::try_parse_from(["mdq", "serve", "--port", "4810"]).unwrap();
    match cli.command {
        CliCommand::Serve { port } => assert_eq!(port, Some(4810)),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_submit_with_defaults() {
    let cli = Cli::try_parse_from([
        "mdq",
        "submit",
        "https://example.com/watch?v=abc",
        "--port",
        "4810",
        "--key",
        "secret",
    ])
    .unwrap();
    match cli.command {
        CliCommand::Submit { source_ref, quality, dest, conn } => {
            assert_eq!(source_ref, "https://example.com/watch?v=abc");
            assert_eq!(quality, "high");
            assert!(dest.is_none());
            assert_eq!(conn.port, 4810);
            assert_eq!(conn.key.as_deref(), Some("secret"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_submit_with_quality_and_dest() {
    let cli = Cli::try_parse_from([
        "mdq",
        "submit",
        "https://example.com/watch?v=abc",
        "--quality",
        "low",
        "--dest",
        "/music",
        "--port",
        "4810",
    ])
    .unwrap();
    match cli.command {
        CliCommand::Submit { quality, dest, conn, .. } => {
            assert_eq!(quality, "low");
            assert_eq!(dest.unwrap().to_str().unwrap(), "/music");
            assert!(conn.key.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn client_commands_require_port() {
    assert!(Cli::try_parse_from(["mdq", "jobs"]).is_err());
    assert!(Cli::try_parse_from(["mdq", "status", "some-id"]).is_err());
    assert!(Cli::try_parse_from(["mdq", "catalog"]).is_err());
}

#[test]
fn parse_catalog_filter() {
    let cli =
        Cli::try_parse_from(["mdq", "catalog", "--contains", "beatles", "--port", "4810"]).unwrap();
    match cli.command {
        CliCommand::Catalog { contains, .. } => assert_eq!(contains.as_deref(), Some("beatles")),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn quality_tier_parsing() {
    use mdq_core::fetcher::Quality;
    assert_eq!(super::parse_quality("low").unwrap(), Quality::Low);
    assert_eq!(super::parse_quality("standard").unwrap(), Quality::Standard);
    assert_eq!(super::parse_quality("high").unwrap(), Quality::High);
    assert!(super::parse_quality("ultra").is_err());
}
