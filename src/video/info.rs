use std::path::Path;
use std::process::Command;

use crate::video::session::SessionError;

#[derive(Debug, Clone, Copy)]
pub struct VideoInfo {
    pub duration: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// Probes duration, framerate, and dimensions via ffprobe's JSON output.
pub fn probe_video(path: &Path) -> Result<VideoInfo, SessionError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| SessionError::probe(path, format!("failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(SessionError::probe(
            path,
            format!("ffprobe exited with {}", output.status),
        ));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| SessionError::probe(path, format!("unparseable ffprobe output: {}", e)))?;

    let duration = json["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| SessionError::probe(path, "duration not found".to_string()))?;

    let streams = json["streams"]
        .as_array()
        .ok_or_else(|| SessionError::probe(path, "no streams found".to_string()))?;
    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"] == "video")
        .ok_or_else(|| SessionError::probe(path, "no video stream found".to_string()))?;

    let fps = video_stream["r_frame_rate"]
        .as_str()
        .map(parse_frame_rate)
        .unwrap_or(30.0);

    let width = video_stream["width"].as_u64().unwrap_or(1920) as u32;
    let height = video_stream["height"].as_u64().unwrap_or(1080) as u32;

    Ok(VideoInfo {
        duration,
        fps,
        width,
        height,
    })
}

/// ffprobe reports framerate as a ratio like "30/1" or "30000/1001".
fn parse_frame_rate(raw: &str) -> f64 {
    if let Some((num, den)) = raw.split_once('/') {
        let numerator: f64 = num.parse().unwrap_or(30.0);
        let denominator: f64 = den.parse().unwrap_or(1.0);
        if denominator != 0.0 {
            numerator / denominator
        } else {
            30.0
        }
    } else {
        raw.parse().unwrap_or(30.0)
    }
}
