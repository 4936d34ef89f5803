use std::io::Write;

/// 安装全局 logger
///
/// 默认级别为 Info，可以通过 `RUST_LOG` 覆盖
pub fn init_log() {
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            let info_style = buf
                .default_level_style(log::Level::Info)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green)));
            let warn_style = buf
                .default_level_style(log::Level::Warn)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)));
            let error_style = buf
                .default_level_style(log::Level::Error)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));

            let level_style = match record.level() {
                log::Level::Info => info_style,
                log::Level::Warn => warn_style,
                log::Level::Error => error_style,
                _ => buf.default_level_style(record.level()),
            };
            let grey_style = info_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));

            let line = record.line().unwrap_or(!0);
            let file = short_file_name(record.file().unwrap_or(""));
            let time = chrono::Local::now().format("%Y/%m/%d %H:%M:%S%.3f");
            let level = record.level();
            let module = record.module_path().unwrap_or("");

            writeln!(
                buf,
                "{level_style}[{time}] {level}: {}{level_style:#}\n\t {grey_style}In {module} At {file}:{line}{grey_style:#}",
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info);

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    // 允许重复调用（例如多个测试各自初始化）
    let _ = builder.try_init();
}

/// 只保留文件名，兼容 `/` 和 `\` 两种分隔符
fn short_file_name(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_file_name() {
        assert_eq!(short_file_name("engine\\crates\\foo.rs"), "foo.rs");
        assert_eq!(short_file_name("engine/crates/bar.rs"), "bar.rs");
        assert_eq!(short_file_name("baz.rs"), "baz.rs");
        assert_eq!(short_file_name(""), "");
    }

    #[test]
    fn test_init_log_twice() {
        init_log();
        init_log();
        log::info!("logger installed");
    }
}
