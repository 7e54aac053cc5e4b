use crate::config::*;
use tracing::Subscriber;
use tracing_core::LevelFilter;
use tracing_subscriber::{filter::filter_fn, prelude::*, registry::LookupSpan, Layer};

use std::{io::Error as IoError, path::Path};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

fn build_target<S>(conf: LogEntry, dir: &Path) -> Result<BoxedLayer<S>, IoError>
where
    S: Subscriber + Send + Sync,
    for<'span> S: LookupSpan<'span>,
{
    let layer = match &conf.target {
        LogTarget::File { filename } => {
            std::fs::create_dir_all(dir)?;
            tracing_subscriber::fmt::layer()
                .with_writer(tracing_appender::rolling::daily(dir, filename))
                .with_ansi(false)
                .boxed()
        }
        LogTarget::Builtin(BuiltinLogTarget::Stdout) => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .boxed(),
        LogTarget::Builtin(BuiltinLogTarget::Stderr) => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let level: LevelFilter = conf.level.map(Into::into).unwrap_or(LevelFilter::TRACE);
    let modules = conf.modules;

    let filter = filter_fn(move |metadata| {
        metadata.level() <= &level
            && (modules.is_empty()
                || match metadata.module_path() {
                    Some(module) => modules.iter().any(|m| module.starts_with(m.as_str())),
                    None => true,
                })
    });

    Ok(layer.with_filter(filter).boxed())
}

/// Build the process-wide subscriber described by `conf`: one fmt layer per
/// configured target, each with its own level and module filter, beneath a
/// global per-module level filter.
pub fn build_subscriber(conf: LoggingConfig) -> Result<impl Subscriber + Send + Sync, IoError> {
    let mut layers = Vec::new();

    for target in conf.targets {
        layers.push(build_target(target, &conf.dir)?);
    }

    // Permissive by default so that individual targets can filter as they need to;
    // module-levels is for quietening noisy dependencies
    let filter = tracing_subscriber::filter::Targets::new()
        .with_default(conf.default_level.unwrap_or(LogLevel::Trace))
        .with_targets(conf.module_levels);

    Ok(tracing_subscriber::registry().with(filter).with(layers))
}
