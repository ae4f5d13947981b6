//! Writes each turn's rehearsal tree as `<dir>/<name>.dot`, and as `.png` through Graphviz
//! `dot` when asked.

use std::path::{Path, PathBuf};
use std::process::Command;

use rehearsal::{RenderError, TreeExport, TreeRenderer};

pub struct DotFileRenderer {
    dir: PathBuf,
    png: bool,
}

impl DotFileRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            png: true,
        }
    }

    pub fn with_png(mut self, png: bool) -> Self {
        self.png = png;
        self
    }

    fn render_png(&self, dot_path: &Path, name: &str) -> Result<(), RenderError> {
        let png_path = self.dir.join(format!("{}.png", name));
        let output = Command::new("dot")
            .arg("-Tpng")
            .arg(dot_path)
            .arg("-o")
            .arg(&png_path)
            .output()
            .map_err(|e| RenderError::Renderer(format!("graphviz dot not runnable: {}", e)))?;
        if !output.status.success() {
            return Err(RenderError::Renderer(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        tracing::debug!(path = %png_path.display(), "tree png written");
        Ok(())
    }
}

impl TreeRenderer for DotFileRenderer {
    fn render(&self, name: &str, export: &TreeExport) -> Result<(), RenderError> {
        let dot_path = self.dir.join(format!("{}.dot", name));
        std::fs::write(&dot_path, export.to_dot())?;
        tracing::debug!(path = %dot_path.display(), "tree dot written");
        if self.png {
            self.render_png(&dot_path, name)?;
        }
        Ok(())
    }
}
