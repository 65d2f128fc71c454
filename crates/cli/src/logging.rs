use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = errors only (step traces stay quiet, the summary speaks)
	// 1 (-v) = info: one line per step and scenario
	// 2+ (-vv) = debug for everything, including WebDriver plumbing
	let filter = match verbosity {
		0 => "error",
		1 => "info,fantoccini=warn,hyper=warn",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
