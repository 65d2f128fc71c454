use clap::Parser;
use veri_cli::cli::Cli;
use veri_cli::error::VeriError;
use veri_cli::output::{self, OutputFormat, ResultBuilder};
use veri_cli::{commands, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	let command = cli.command.name();

	match commands::dispatch(cli).await {
		Ok(code) => std::process::exit(code),
		Err(err) => {
			handle_error(err, command, format);
			std::process::exit(1);
		}
	}
}

fn handle_error(err: VeriError, command: &str, format: OutputFormat) {
	let cmd_error = err.to_command_error();

	// Humans read stderr
	output::print_error_stderr(&cmd_error);

	// Agents read the envelope
	if format != OutputFormat::Text {
		let mut result: output::CommandResult<()> = ResultBuilder::new(command)
			.error(cmd_error.code, &cmd_error.message)
			.build();
		if let Some(error) = result.error.as_mut() {
			error.details = cmd_error.details;
		}
		output::print_result(&result, format);
	}
}
