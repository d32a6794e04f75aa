use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::tools::find_on_path;
use crate::{Clip, ConfigError, i420_frame_size};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipFormat {
    RawI420,
    Y4m,
}

/// A validated clip argument: `<path>[._]<W>_<H>.yuv:<FPS>` or `<path>.y4m`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipDescriptor {
    pub path: PathBuf,
    pub format: ClipFormat,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl ClipDescriptor {
    /// Parses a descriptor and checks that the file is there.
    pub fn parse(descriptor: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidClip {
            descriptor: descriptor.to_owned(),
            reason: reason.to_owned(),
        };

        if descriptor.ends_with(".y4m") {
            let path = PathBuf::from(descriptor);
            if !path.is_file() {
                return Err(invalid("file does not exist"));
            }
            let header = read_y4m_header(&path).map_err(|source| ConfigError::ClipIo {
                path: path.clone(),
                source,
            })?;
            let (width, height, fps) = parse_y4m_header(&header).map_err(|reason| invalid(&reason))?;
            return Ok(Self {
                path,
                format: ClipFormat::Y4m,
                width,
                height,
                fps,
            });
        }

        let Some((path, fps)) = descriptor.rsplit_once(':') else {
            return Err(invalid("expected <file>.yuv:<fps> or <file>.y4m"));
        };
        let fps = fps
            .parse::<f64>()
            .ok()
            .filter(|fps| *fps > 0.0 && fps.is_finite())
            .ok_or_else(|| invalid("frame rate must be a positive number"))?;
        let (width, height) =
            dimensions_from_name(path).ok_or_else(|| invalid("file name must end in <W>_<H>.yuv"))?;
        let path = PathBuf::from(path);
        if !path.is_file() {
            return Err(invalid("file does not exist"));
        }
        Ok(Self {
            path,
            format: ClipFormat::RawI420,
            width,
            height,
            fps,
        })
    }
}

/// `foreman_cif.352_288.yuv` or `foreman_352_288.yuv` -> (352, 288).
fn dimensions_from_name(path: &str) -> Option<(u32, u32)> {
    let stem = path.strip_suffix(".yuv")?;
    let (rest, height) = stem.rsplit_once('_')?;
    let (_, width) = rest.rsplit_once(['_', '.'])?;
    let width = width.parse::<u32>().ok().filter(|w| *w > 0)?;
    let height = height.parse::<u32>().ok().filter(|h| *h > 0)?;
    Some((width, height))
}

fn read_y4m_header(path: &Path) -> io::Result<String> {
    let mut line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut line)?;
    Ok(line)
}

fn parse_y4m_header(header: &str) -> Result<(u32, u32, f64), String> {
    let mut tokens = header.split_ascii_whitespace();
    if tokens.next() != Some("YUV4MPEG2") {
        return Err("missing YUV4MPEG2 signature".to_owned());
    }
    let (mut width, mut height, mut fps) = (None, None, None);
    for token in tokens {
        let Some((tag, value)) = token.split_at_checked(1) else {
            continue;
        };
        match tag {
            "W" => width = value.parse::<u32>().ok(),
            "H" => height = value.parse::<u32>().ok(),
            "F" => {
                fps = value.split_once(':').and_then(|(num, den)| {
                    let num = num.parse::<f64>().ok()?;
                    let den = den.parse::<f64>().ok().filter(|d| *d > 0.0)?;
                    Some(num / den)
                })
            }
            _ => {}
        }
    }
    match (width, height, fps) {
        (Some(w), Some(h), Some(f)) if w > 0 && h > 0 && f > 0.0 => Ok((w, h, f)),
        _ => Err("y4m header lacks width, height or frame rate".to_owned()),
    }
}

pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut File::open(path)?, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hashes, converts and truncates clips into `scratch`.
pub fn prepare_clips(
    descriptors: &[ClipDescriptor],
    scratch: &Path,
    frame_offset: u64,
    num_frames: Option<u64>,
) -> Result<Vec<Arc<Clip>>, ConfigError> {
    descriptors
        .iter()
        .enumerate()
        .map(|(index, descriptor)| {
            prepare_clip(descriptor, index, scratch, frame_offset, num_frames).map(Arc::new)
        })
        .collect()
}

fn prepare_clip(
    descriptor: &ClipDescriptor,
    index: usize,
    scratch: &Path,
    frame_offset: u64,
    num_frames: Option<u64>,
) -> Result<Clip, ConfigError> {
    let input = &descriptor.path;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let sha256 = sha256_file(input).map_err(clip_io(input))?;
    let mut yuv_path = match descriptor.format {
        ClipFormat::RawI420 => input.clone(),
        ClipFormat::Y4m => {
            let out = scratch.join(format!("{index}-{stem}.yuv"));
            convert_y4m(input, &out)?;
            out
        }
    };

    let frame_size = i420_frame_size(descriptor.width, descriptor.height);
    let total_frames = fs::metadata(&yuv_path).map_err(clip_io(&yuv_path))?.len() / frame_size;
    if total_frames == 0 {
        return Err(ConfigError::EmptyClip {
            path: input.clone(),
        });
    }
    if frame_offset >= total_frames {
        return Err(ConfigError::FrameOffsetOutOfRange {
            path: input.clone(),
            offset: frame_offset,
            total: total_frames,
        });
    }
    let available = total_frames - frame_offset;
    let frames = num_frames.map_or(available, |n| n.min(available));
    if frames == 0 {
        return Err(ConfigError::Invalid("--num-frames must be at least 1".to_owned()));
    }

    if frames != total_frames {
        let out = scratch.join(format!("{index}-{stem}.truncated.yuv"));
        copy_frames(&yuv_path, &out, frame_offset * frame_size, frames * frame_size)
            .map_err(clip_io(&out))?;
        yuv_path = out;
    }

    info!(
        clip = %input.display(),
        width = descriptor.width,
        height = descriptor.height,
        fps = descriptor.fps,
        frames,
        "prepared clip"
    );
    Ok(Clip {
        input_path: input.clone(),
        yuv_path,
        width: descriptor.width,
        height: descriptor.height,
        fps: descriptor.fps,
        sha256,
        total_frames,
        frame_offset,
        frames,
    })
}

fn clip_io(path: &Path) -> impl FnOnce(io::Error) -> ConfigError + use<> {
    let path = path.to_path_buf();
    move |source| ConfigError::ClipIo { path, source }
}

fn convert_y4m(input: &Path, out: &Path) -> Result<(), ConfigError> {
    let ffmpeg = find_on_path("ffmpeg").ok_or_else(|| ConfigError::MissingTool {
        tool: "ffmpeg".to_owned(),
        searched: "PATH".to_owned(),
    })?;
    let output = Command::new(ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(input)
        .arg(out)
        .output()
        .map_err(|source| ConfigError::ClipIo {
            path: input.to_path_buf(),
            source,
        })?;
    if !output.status.success() {
        return Err(ConfigError::ClipConversion {
            path: input.to_path_buf(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(())
}

fn copy_frames(src: &Path, dst: &Path, offset: u64, len: u64) -> io::Result<()> {
    let mut reader = File::open(src)?;
    reader.seek(SeekFrom::Start(offset))?;
    let mut writer = File::create(dst)?;
    let copied = io::copy(&mut reader.take(len), &mut writer)?;
    if copied != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("copied {copied} of {len} bytes"),
        ));
    }
    Ok(())
}
