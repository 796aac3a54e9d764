//! 输出文件的暂存与统一提交.
//!
//! 所有输出先写入同目录下的临时文件, 全部成功后才依次重命名为目标路径.
//! 任一步失败时, 不会留下任何目标文件.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

/// 一组待提交的输出文件.
#[derive(Debug, Default)]
pub struct Staging {
    /// `(临时路径, 目标路径)`.
    entries: Vec<(PathBuf, PathBuf)>,
}

/// 与 `dest` 同目录的临时路径: `.tmp-<pid>-<文件名>`.
///
/// 保留原文件名结尾, 因此 `.nii.gz` 仍按 gzip 格式写入.
fn temp_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".tmp-{}-{name}", std::process::id()))
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记目标路径 `dest`, 返回应当写入的临时路径.
    pub fn stage(&mut self, dest: &Path) -> PathBuf {
        let tmp = temp_path(dest);
        self.entries.push((tmp.clone(), dest.to_owned()));
        tmp
    }

    /// 按登记顺序将临时文件重命名为目标路径.
    ///
    /// 某次重命名失败时, 删除已经提交的目标文件, 剩余临时文件由 `Drop` 清理.
    pub fn commit(mut self) -> io::Result<()> {
        let entries = std::mem::take(&mut self.entries);
        for (i, (tmp, dest)) in entries.iter().enumerate() {
            if let Err(e) = fs::rename(tmp, dest) {
                for (_, done) in &entries[..i] {
                    fs::remove_file(done).ok();
                }
                self.entries = entries[i..].to_vec();
                return Err(io::Error::new(
                    e.kind(),
                    format!("failed to move output to `{}`: {e}", dest.display()),
                ));
            }
            debug!("`{}` -> `{}`", tmp.display(), dest.display());
        }
        Ok(())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        for (tmp, _) in &self.entries {
            if tmp.exists() {
                fs::remove_file(tmp).ok();
            }
        }
    }
}
