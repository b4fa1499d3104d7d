use std::sync::LazyLock;

/// Version of the software as reported at startup and by `--version`.
///
/// Uses the Cargo package version, suffixed with the `WATCHCOUNT_BUILD` tag
/// when one was set at compile time (e.g. a commit hash from CI).
pub static VERSION: LazyLock<String> = LazyLock::new(|| match option_env!("WATCHCOUNT_BUILD") {
    Some(tag) if !tag.is_empty() => format!("{}-{tag}", env!("CARGO_PKG_VERSION")),
    _ => env!("CARGO_PKG_VERSION").to_string(),
});
