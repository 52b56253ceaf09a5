use std::io::Read;
use std::path::Path;

/// Declared type of a pipeline file, derived from its extension. Drives
/// check dispatch and mime metadata; the structural validators probe magic
/// bytes rather than fully parsing the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    NetCdf,
    Csv,
    Pdf,
    Zip,
    Manifest,
    DeleteManifest,
    Png,
    Jpeg,
    Unknown,
}

impl FileType {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("nc") => FileType::NetCdf,
            Some("csv") => FileType::Csv,
            Some("pdf") => FileType::Pdf,
            Some("zip") => FileType::Zip,
            Some("manifest") => FileType::Manifest,
            Some("delete_manifest") => FileType::DeleteManifest,
            Some("png") => FileType::Png,
            Some("jpg") | Some("jpeg") => FileType::Jpeg,
            _ => FileType::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileType::NetCdf => "netcdf",
            FileType::Csv => "csv",
            FileType::Pdf => "pdf",
            FileType::Zip => "zip",
            FileType::Manifest => "manifest",
            FileType::DeleteManifest => "delete_manifest",
            FileType::Png => "png",
            FileType::Jpeg => "jpeg",
            FileType::Unknown => "unknown",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            FileType::NetCdf => "application/x-netcdf",
            FileType::Csv => "text/csv",
            FileType::Pdf => "application/pdf",
            FileType::Zip => "application/zip",
            FileType::Manifest | FileType::DeleteManifest => "text/plain",
            FileType::Png => "image/png",
            FileType::Jpeg => "image/jpeg",
            FileType::Unknown => "application/octet-stream",
        }
    }

    /// Whether the extension alone identifies the format well enough for a
    /// format-only structural check.
    pub fn is_known(&self) -> bool {
        !matches!(self, FileType::Unknown)
    }

    /// Scientific formats are the ones compliance suites apply to.
    pub fn is_scientific(&self) -> bool {
        matches!(self, FileType::NetCdf)
    }

    /// Probe the file content against the declared type. Returns Ok(false)
    /// for a readable file that does not match, Err only on read failure.
    pub fn validate(&self, path: &Path) -> std::io::Result<bool> {
        match self {
            FileType::NetCdf => probe_magic(path, &[b"CDF\x01", b"CDF\x02", b"\x89HDF\r\n\x1a\n"]),
            FileType::Pdf => probe_magic(path, &[b"%PDF"]),
            FileType::Zip => probe_magic(path, &[b"PK\x03\x04"]),
            FileType::Png => probe_magic(path, &[b"\x89PNG\r\n\x1a\n"]),
            FileType::Jpeg => probe_magic(path, &[b"\xff\xd8\xff"]),
            FileType::Csv | FileType::Manifest | FileType::DeleteManifest => is_plain_text(path),
            FileType::Unknown => is_nonempty(path),
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub fn is_nonempty(path: &Path) -> std::io::Result<bool> {
    Ok(std::fs::metadata(path)?.len() > 0)
}

fn probe_magic(path: &Path, candidates: &[&[u8]]) -> std::io::Result<bool> {
    let longest = candidates.iter().map(|c| c.len()).max().unwrap_or(0);
    let mut buf = vec![0u8; longest];
    let mut file = std::fs::File::open(path)?;
    let read = read_up_to(&mut file, &mut buf)?;
    Ok(candidates.iter().any(|c| read >= c.len() && buf.starts_with(c)))
}

/// Nonempty and no NUL bytes in the first kilobyte.
fn is_plain_text(path: &Path) -> std::io::Result<bool> {
    let mut buf = [0u8; 1024];
    let mut file = std::fs::File::open(path)?;
    let read = read_up_to(&mut file, &mut buf)?;
    Ok(read > 0 && !buf[..read].contains(&0))
}

fn read_up_to(file: &mut std::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = file.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}
