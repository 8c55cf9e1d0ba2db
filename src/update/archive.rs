use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use crate::error::{UpdateError, UpdateResult};

/// Archive formats accepted in the drop folder, identified by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else {
            None
        }
    }
}

/// Unpack `archive` into `output_dir`. Entries escaping the output directory
/// are refused by both backends.
pub fn extract(archive: &Path, output_dir: &Path) -> UpdateResult<()> {
    let kind = ArchiveKind::from_path(archive)
        .ok_or_else(|| UpdateError::invalid(format!("unsupported archive type: {}", archive.display())))?;

    fs::create_dir_all(output_dir).map_err(|e| UpdateError::io(output_dir, e))?;
    let file = File::open(archive).map_err(|e| UpdateError::io(archive, e))?;
    let archive_err = |message: String| UpdateError::Archive {
        archive: archive.to_path_buf(),
        message,
    };

    match kind {
        ArchiveKind::Zip => {
            let mut zip = zip::ZipArchive::new(BufReader::new(file))
                .map_err(|e| archive_err(e.to_string()))?;
            zip.extract(output_dir).map_err(|e| archive_err(e.to_string()))?;
        }
        ArchiveKind::TarGz => {
            let decoder = GzDecoder::new(BufReader::new(file));
            let mut tar = tar::Archive::new(decoder);
            tar.unpack(output_dir)
                .map_err(|e| archive_err(e.to_string()))?;
        }
    }

    debug!(archive = %archive.display(), output = %output_dir.display(), ?kind, "archive extracted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    #[test]
    fn kind_from_extension() {
        assert_eq!(ArchiveKind::from_path(Path::new("a/B.ZIP")), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_path(Path::new("x.tar.gz")), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_path(Path::new("x.tgz")), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_path(Path::new("x.rar")), None);
    }

    #[test]
    fn extracts_zip() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.zip");
        let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
        writer
            .start_file("AI_Environment/README.md", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hello").unwrap();
        writer.finish().unwrap();

        let out = dir.path().join("out");
        extract(&archive, &out).unwrap();
        assert_eq!(
            fs::read_to_string(out.join("AI_Environment").join("README.md")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn extracts_tar_gz() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.tar.gz");
        let encoder = GzEncoder::new(File::create(&archive).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let data = b"print('hi')";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "AI_Environment/src/main.py", &data[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let out = dir.path().join("out");
        extract(&archive, &out).unwrap();
        assert!(out.join("AI_Environment").join("src").join("main.py").is_file());
    }

    #[test]
    fn garbage_zip_is_archive_error() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, "definitely not a zip").unwrap();

        let err = extract(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, UpdateError::Archive { .. }));
    }
}
