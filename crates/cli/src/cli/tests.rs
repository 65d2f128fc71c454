use std::path::PathBuf;

use clap::Parser;

use super::*;

#[test]
fn parse_run_with_files_and_builtins() {
	let args = vec![
		"veri",
		"run",
		"scenarios/settings.yaml",
		"scenarios/extra",
		"--builtin",
		"settings-dialog",
		"--builtin",
		"panic-gating",
		"-j",
		"2",
	];
	let cli = Cli::try_parse_from(args).unwrap();

	match cli.command {
		Commands::Run(args) => {
			assert_eq!(
				args.files,
				vec![PathBuf::from("scenarios/settings.yaml"), PathBuf::from("scenarios/extra")]
			);
			assert_eq!(args.builtins, ["settings-dialog", "panic-gating"]);
			assert_eq!(args.jobs, Some(2));
			assert!(!args.all_builtins);
			assert!(!args.headed);
		}
		_ => panic!("Expected Run command"),
	}
}

#[test]
fn parse_run_overrides() {
	let args = vec![
		"veri",
		"run",
		"--all-builtins",
		"--base-url",
		"http://localhost:3000",
		"--browser",
		"firefox",
		"--headed",
		"-o",
		"/tmp/veri",
		"--scenario-timeout",
		"90000",
		"--wait-timeout",
		"8000",
		"--poll",
		"50",
		"--mobile",
	];
	let cli = Cli::try_parse_from(args).unwrap();

	match cli.command {
		Commands::Run(args) => {
			assert!(args.all_builtins);
			assert_eq!(args.base_url.as_deref(), Some("http://localhost:3000"));
			assert_eq!(args.browser, Some(Browser::Firefox));
			assert!(args.headed);
			assert_eq!(args.output, Some(PathBuf::from("/tmp/veri")));
			assert_eq!(args.scenario_timeout, Some(90_000));
			assert_eq!(args.wait_timeout, Some(8000));
			assert_eq!(args.poll, Some(50));
			assert!(args.mobile);
		}
		_ => panic!("Expected Run command"),
	}
}

#[test]
fn all_builtins_conflicts_with_named_builtins() {
	let args = vec!["veri", "run", "--all-builtins", "--builtin", "pin-round-trip"];
	assert!(Cli::try_parse_from(args).is_err());
}

#[test]
fn unknown_browser_is_rejected() {
	let args = vec!["veri", "run", "--browser", "netscape"];
	assert!(Cli::try_parse_from(args).is_err());
}

#[test]
fn parse_check_requires_files() {
	assert!(Cli::try_parse_from(vec!["veri", "check"]).is_err());

	let cli = Cli::try_parse_from(vec!["veri", "check", "a.yaml"]).unwrap();
	match cli.command {
		Commands::Check(args) => assert_eq!(args.files, vec![PathBuf::from("a.yaml")]),
		_ => panic!("Expected Check command"),
	}
}

#[test]
fn global_flags_after_subcommand() {
	let cli = Cli::try_parse_from(vec!["veri", "list", "-f", "json", "-vv", "--config", "ci/veri.toml"]).unwrap();
	assert!(matches!(cli.command, Commands::List));
	assert_eq!(cli.format, OutputFormat::Json);
	assert_eq!(cli.verbose, 2);
	assert_eq!(cli.config, Some(PathBuf::from("ci/veri.toml")));
}

#[test]
fn defaults() {
	let cli = Cli::try_parse_from(vec!["veri", "run"]).unwrap();
	assert_eq!(cli.format, OutputFormat::Toon);
	assert_eq!(cli.verbose, 0);
	match cli.command {
		Commands::Run(args) => {
			assert!(args.files.is_empty());
			assert!(args.builtins.is_empty());
			assert_eq!(args.jobs, None);
		}
		_ => panic!("Expected Run command"),
	}
}
