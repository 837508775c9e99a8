use {
    std::sync::atomic::AtomicBool,
    tracing_subscriber::EnvFilter,
};

pub(crate) static DEBUG: AtomicBool = AtomicBool::new(false);

macro_rules! debug_println {
    ($($arg:tt)*) => {
        if $crate::common::DEBUG.load(::std::sync::atomic::Ordering::Relaxed) {
            println!($($arg)*);
        }
    };
}

pub(crate) use debug_println;

/// Sends `tracing` events to stderr. `RUST_LOG` takes precedence over the debug flag.
pub(crate) fn init_logging(debug: bool) -> anyhow::Result<()> {
    let level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
