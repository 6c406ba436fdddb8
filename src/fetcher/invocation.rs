use super::process::Invocation;
use crate::config::FetcherConfig;
use std::path::Path;

impl Invocation {
    /// Build the downloader command line for `url`
    ///
    /// Everything except the URL and the optional cookie file is fixed by
    /// configuration. `--print after_move:filepath` makes the tool report the
    /// final merged file on stdout.
    pub fn build(config: &FetcherConfig, url: &str, cookies: Option<&Path>) -> Self {
        let output_template = config
            .download_dir
            .join(format!("%(title).{}s.%(ext)s", config.title_max_len));

        let mut args: Vec<String> = vec![
            "--no-check-update".into(),
            // Format selection
            "--format".into(),
            config.format.clone(),
            "--merge-output-format".into(),
            config.merge_format.clone(),
            // Output
            "--output".into(),
            output_template.to_string_lossy().into_owned(),
            "--no-playlist".into(),
            "--print".into(),
            "after_move:filepath".into(),
            // Request fingerprint
            "--user-agent".into(),
            config.user_agent.clone(),
            "--referer".into(),
            config.referer.clone(),
            // Rate limiting
            "--limit-rate".into(),
            config.rate_limit.clone(),
            "--sleep-interval".into(),
            config.sleep_interval.to_string(),
            "--max-sleep-interval".into(),
            config.max_sleep_interval.to_string(),
            // Network
            "--socket-timeout".into(),
            config.socket_timeout.to_string(),
            "--retries".into(),
            config.tool_retries.to_string(),
            "--fragment-retries".into(),
            config.fragment_retries.to_string(),
            "--no-warnings".into(),
            "--ignore-errors".into(),
        ];

        if let Some(path) = cookies {
            args.push("--cookies".into());
            args.push(path.to_string_lossy().into_owned());
        }

        // "--" keeps a URL starting with '-' from being read as an option
        args.push("--".into());
        args.push(url.to_string());

        Self {
            program: config.binary.clone(),
            args,
        }
    }

    /// Value following `flag`, if present
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }
}
