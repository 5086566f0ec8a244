//! yt-dlp argument building and the compiled-in retrieval limits.

use std::ffi::OsString;
use std::path::Path;

use crate::job::{FormatKind, Job};

use super::media_info::MediaReference;

/// Hard per-download cap handed to yt-dlp as `--max-filesize`.
pub const MAX_DOWNLOAD_SIZE: &str = "50M";

/// What yt-dlp prints when `--max-filesize` stops a download.
pub const MAX_FILESIZE_MARKER: &str = "File is larger than max-filesize";

/// Progress lines look like `tubequeue-  42.1%`; see `progress::parse_progress_percent`.
pub const PROGRESS_TEMPLATE: &str = "download:tubequeue-%(progress._percent_str)s";

/// Best single stream under the cap, otherwise the worst available.
pub const VIDEO_FORMAT_SELECTOR: &str = "b[filesize<50M] / w";

pub const AUDIO_FORMAT_SELECTOR: &str = "bestaudio[ext=m4a]/bestaudio";

const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Format selection and post-processing for a format kind.
pub fn build_format_args(kind: FormatKind) -> Vec<&'static str> {
    match kind {
        FormatKind::Video => vec!["-f", VIDEO_FORMAT_SELECTOR, "--remux-video", "mp4"],
        FormatKind::Audio => vec!["-f", AUDIO_FORMAT_SELECTOR, "-x", "--audio-format", "mp3"],
    }
}

/// Full argument list for downloading `job` into `dir`.
pub fn build_download_args(job: &Job, dir: &Path, cookies: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--no-playlist".into(),
        "--newline".into(),
        "--progress-template".into(),
        PROGRESS_TEMPLATE.into(),
    ];

    args.extend(build_format_args(job.kind).into_iter().map(OsString::from));
    args.push("--max-filesize".into());
    args.push(MAX_DOWNLOAD_SIZE.into());

    if let Some(cookies) = cookies {
        args.push("--cookies".into());
        args.push(cookies.as_os_str().to_owned());
    }

    args.push("-o".into());
    args.push(dir.join(OUTPUT_TEMPLATE).into_os_string());
    args.push(job.source_url().into());
    args
}

/// Arguments for a metadata-only dump of `reference`.
pub fn build_info_args(reference: &MediaReference, cookies: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--no-playlist".into(), "--dump-json".into()];

    if let Some(cookies) = cookies {
        args.push("--cookies".into());
        args.push(cookies.as_os_str().to_owned());
    }

    match reference {
        MediaReference::Url(url) => args.push(url.into()),
        MediaReference::Search(query) => {
            args.push("--default-search".into());
            args.push("ytsearch".into());
            args.push(format!("ytsearch:{query}").into());
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FormatChoice, MessageRef};

    fn job(kind: FormatKind) -> Job {
        Job::admit(FormatChoice::new(kind, "dQw4w9WgXcQ", 1), MessageRef { chat_id: 1, message_id: 2 }).unwrap()
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).map(String::as_str)
    }

    #[test]
    fn video_args_use_capped_selector_and_mp4() {
        let args = strings(build_download_args(&job(FormatKind::Video), Path::new("/tmp/w"), None));

        assert_eq!(value_after(&args, "-f"), Some(VIDEO_FORMAT_SELECTOR));
        assert_eq!(value_after(&args, "--remux-video"), Some("mp4"));
        assert_eq!(value_after(&args, "--max-filesize"), Some("50M"));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(!args.contains(&"-x".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
    }

    #[test]
    fn audio_args_extract_mp3() {
        let args = strings(build_download_args(&job(FormatKind::Audio), Path::new("/tmp/w"), None));

        assert_eq!(value_after(&args, "-f"), Some(AUDIO_FORMAT_SELECTOR));
        assert!(args.contains(&"-x".to_string()));
        assert_eq!(value_after(&args, "--audio-format"), Some("mp3"));
        assert_eq!(value_after(&args, "--max-filesize"), Some("50M"));
    }

    #[test]
    fn output_template_is_rooted_in_working_dir() {
        let args = strings(build_download_args(&job(FormatKind::Audio), Path::new("/tmp/w"), None));
        let template = value_after(&args, "-o").unwrap();
        assert!(Path::new(template).starts_with("/tmp/w"));
        assert!(template.ends_with("%(title)s.%(ext)s"));
    }

    #[test]
    fn cookies_are_passed_when_configured() {
        let args = strings(build_download_args(
            &job(FormatKind::Video),
            Path::new("/tmp/w"),
            Some(Path::new("cookies.txt")),
        ));
        assert_eq!(value_after(&args, "--cookies"), Some("cookies.txt"));

        let args = strings(build_info_args(&MediaReference::Url("https://youtu.be/x".into()), None));
        assert!(!args.contains(&"--cookies".to_string()));
    }

    #[test]
    fn info_args_for_url_and_search() {
        let url = strings(build_info_args(&MediaReference::Url("https://youtu.be/abc".into()), None));
        assert_eq!(url, ["--no-playlist", "--dump-json", "https://youtu.be/abc"]);

        let search = strings(build_info_args(&MediaReference::Search("some song".into()), None));
        assert_eq!(value_after(&search, "--default-search"), Some("ytsearch"));
        assert_eq!(search.last().map(String::as_str), Some("ytsearch:some song"));
        assert!(search.contains(&"--dump-json".to_string()));
    }
}
