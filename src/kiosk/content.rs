//! HTML content shown inside the locked surface.
//!
//! The surface renders a home page built from the configured video links —
//! a thumbnail grid where each tile posts its video id back as the single
//! "item selected" message — and a detail page embedding the selected
//! video.

use regex::Regex;
use std::sync::OnceLock;

fn video_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:https?://)?(?:www\.)?(?:youtube\.com/watch\?v=|youtu\.be/)([A-Za-z0-9_-]{11})")
            .expect("video id pattern is valid")
    })
}

/// Extract the 11-character video id from a watch or short-form URL.
pub fn video_id(url: &str) -> Option<String> {
    video_id_pattern()
        .captures(url.trim())
        .map(|caps| caps[1].to_string())
}

/// Build the home page: one clickable thumbnail per recognizable link.
/// Links without an extractable video id are skipped.
pub fn home_page(links: &[String]) -> String {
    let mut tiles = String::new();
    for link in links {
        if let Some(id) = video_id(link) {
            tiles.push_str(&format!(
                "\n        <div class='video-item' onclick=\"selectVideo('{id}')\">\n            \
                 <img src='https://img.youtube.com/vi/{id}/0.jpg' />\n        </div>"
            ));
        }
    }

    format!(
        r#"<html>
<head>
    <title>Pick a story</title>
    <meta charset='UTF-8'>
    <style>
        body {{ background-color: #222; margin: 0; padding: 20px; font-family: sans-serif; display: flex; flex-direction: column; align-items: center; }}
        .video-item {{ cursor: pointer; margin-bottom: 20px; width: 33.33%; max-width: 480px; border: 2px solid #444; border-radius: 10px; overflow: hidden; transition: transform 0.2s; }}
        .video-item:hover {{ transform: scale(1.05); border-color: #777; }}
        .video-item img {{ width: 100%; display: block; }}
        h1 {{ color: #eee; }}
    </style>
    <script>
        function selectVideo(videoId) {{
            window.chrome.webview.postMessage(videoId);
        }}
    </script>
</head>
<body>
    <h1>Pick a story</h1>{tiles}
</body>
</html>"#
    )
}

/// Build the detail page embedding one video.
pub fn detail_page(video_id: &str) -> String {
    format!(
        r#"<html>
<head>
    <title>Watching</title>
    <meta charset='UTF-8'>
    <style>
        body {{ margin: 0; background-color: #000; display: flex; flex-direction: column; justify-content: center; align-items: center; height: 100vh; }}
        iframe {{ width: 95vw; height: 95vh; border: none; }}
        .back-button {{ position: absolute; top: 10px; left: 10px; padding: 10px 20px; background-color: #333; color: white; border: none; border-radius: 5px; cursor: pointer; font-size: 16px; }}
    </style>
</head>
<body>
    <button class='back-button' onclick='window.history.back()'>Back to stories</button>
    <iframe src='https://www.youtube.com/embed/{video_id}?autoplay=1&rel=0&iv_load_policy=3&showinfo=0&controls=1'></iframe>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_watch_url() {
        assert_eq!(
            video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_video_id_short_url() {
        assert_eq!(
            video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(video_id("youtu.be/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_video_id_rejects_other_urls() {
        assert_eq!(video_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(video_id("not a url"), None);
    }

    #[test]
    fn test_home_page_renders_tiles() {
        let links = vec![
            "https://www.youtube.com/watch?v=aaaaaaaaaaa".to_string(),
            "https://broken.example/nothing".to_string(),
            "https://youtu.be/bbbbbbbbbbb".to_string(),
        ];
        let html = home_page(&links);
        assert!(html.contains("selectVideo('aaaaaaaaaaa')"));
        assert!(html.contains("selectVideo('bbbbbbbbbbb')"));
        assert!(html.contains("img.youtube.com/vi/aaaaaaaaaaa/0.jpg"));
        // The unrecognizable link produces no tile.
        assert_eq!(html.matches("class='video-item'").count(), 2);
    }

    #[test]
    fn test_detail_page_embeds_video() {
        let html = detail_page("ccccccccccc");
        assert!(html.contains("youtube.com/embed/ccccccccccc"));
        assert!(html.contains("back-button"));
    }
}
