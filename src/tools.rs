use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::{Codec, ConfigError};

pub const TINY_SSIM: &str = "libvpx/tools/tiny_ssim";
pub const RUN_VMAF: &str = "vmaf/run_vmaf";

/// Locates external binaries, either under a tool root or on `PATH`.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    root: PathBuf,
    use_system_path: bool,
}

impl ToolLocator {
    pub fn new(root: impl Into<PathBuf>, use_system_path: bool) -> Self {
        Self {
            root: root.into(),
            use_system_path,
        }
    }

    /// Tool root next to the running executable.
    pub fn default_root() -> PathBuf {
        env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a tool given relative to the root, e.g. `libvpx/vpxenc`.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ConfigError> {
        let under_root = self.root.join(relative);
        if self.use_system_path {
            let name = Path::new(relative)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| relative.to_owned());
            if let Some(found) = find_on_path(&name) {
                return Ok(found);
            }
            if is_executable(&under_root) {
                warn!(tool = %name, path = %under_root.display(), "not on PATH, using tool root");
                return Ok(under_root);
            }
            return Err(ConfigError::MissingTool {
                tool: relative.to_owned(),
                searched: format!("PATH and {}", self.root.display()),
            });
        }
        if is_executable(&under_root) {
            Ok(under_root)
        } else {
            Err(ConfigError::MissingTool {
                tool: relative.to_owned(),
                searched: self.root.display().to_string(),
            })
        }
    }
}

pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Decoders and analysis tools resolved once per run.
#[derive(Debug, Clone)]
pub struct AnalysisTools {
    pub ssim: PathBuf,
    pub decoders: BTreeMap<Codec, PathBuf>,
    pub vmaf: Option<PathBuf>,
}

impl AnalysisTools {
    /// Resolves the tools the given codecs need. A missing VMAF tool only disables VMAF.
    pub fn resolve(
        locator: &ToolLocator,
        codecs: impl IntoIterator<Item = Codec>,
        enable_vmaf: bool,
    ) -> Result<Self, ConfigError> {
        let ssim = locator.resolve(TINY_SSIM)?;
        let mut decoders = BTreeMap::new();
        for codec in codecs {
            if !decoders.contains_key(&codec) {
                decoders.insert(codec, locator.resolve(codec.decoder_binary())?);
            }
        }
        let vmaf = if enable_vmaf {
            match locator.resolve(RUN_VMAF) {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!("{err}; vmaf disabled");
                    None
                }
            }
        } else {
            None
        };
        Ok(Self {
            ssim,
            decoders,
            vmaf,
        })
    }

    pub fn decoder(&self, codec: Codec) -> Option<&Path> {
        self.decoders.get(&codec).map(PathBuf::as_path)
    }
}
