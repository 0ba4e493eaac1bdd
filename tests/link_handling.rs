//! Link extraction, normalization and the domain allow-list

use config::Config;
use media_relay_bot::config::Settings;
use media_relay_bot::downloader::{extract_link, normalize_link, LinkPolicy};

fn settings_with_domains(domains: &str) -> anyhow::Result<Settings> {
    let config = Config::builder()
        .set_override("telegram_token", "123:abc")?
        .set_override("rapid_api_key", "key")?
        .set_override("channel_id", -1_001_234_567_i64)?
        .set_override("allowed_domains", domains)?
        .build()?;
    Ok(Settings::from_config(config)?)
}

#[test]
fn link_inside_text_is_extracted_and_cleaned() {
    let text = "look at this https://www.instagram.com/reel/Cx1/?igsh=MWQ1 so funny";
    let link = normalize_link(extract_link(text));
    assert_eq!(link, "https://www.instagram.com/reel/Cx1/");
}

#[test]
fn shared_variants_collapse_to_one_key() {
    let a = normalize_link("https://www.tiktok.com/@u/video/42?is_from_webapp=1&sender_device=pc");
    let b = normalize_link("https://www.tiktok.com/@u/video/42#comments");
    let c = normalize_link("https://www.tiktok.com/@u/video/42?utm_source=copy&_r=1&_t=8k");
    assert_eq!(a, b);
    assert_eq!(b, c);
}

#[test]
fn meaningful_parameters_survive() {
    assert_eq!(
        normalize_link("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42"),
        "https://youtube.com/watch?v=dQw4w9WgXcQ&t=42"
    );
}

#[test]
fn text_without_link_passes_through() {
    assert_eq!(normalize_link(extract_link("  hello there  ")), "hello there");
}

#[test]
fn allow_list_from_settings() -> anyhow::Result<()> {
    let settings = settings_with_domains("TikTok.com, www.instagram.com youtu.be")?;
    let policy = LinkPolicy::new(settings.allowed_domains());

    assert!(policy.is_restricted());
    assert!(policy.permits("https://vm.tiktok.com/ZM1/"));
    assert!(policy.permits("https://www.instagram.com/p/abc/"));
    assert!(policy.permits("https://youtu.be/abc"));
    assert!(!policy.permits("https://nottiktok.com/video/1"));
    assert!(!policy.permits("plain text"));
    Ok(())
}

#[test]
fn empty_allow_list_accepts_everything() {
    let policy = LinkPolicy::default();
    assert!(!policy.is_restricted());
    assert!(policy.permits("https://anything.example/x"));
    assert!(policy.permits("not even a link"));
}
