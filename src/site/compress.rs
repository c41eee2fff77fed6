use anyhow::Result;
use brotli::enc::BrotliEncoderParams;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

pub const COMPRESSED_SUFFIX: &str = ".br";
pub const FALLBACK_SUFFIX: &str = ".unbr";
pub const DEFAULT_BROTLI_QUALITY: u32 = 11;
pub const MAX_BROTLI_QUALITY: u32 = 11;
const BROTLI_WINDOW_BITS: i32 = 22;

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn compressed_path(path: &Path) -> PathBuf {
    append_suffix(path, COMPRESSED_SUFFIX)
}

/// Output path for `decompress`: the `.br` suffix stripped, or `.unbr`
/// appended so the input is never overwritten.
pub fn decompressed_path(path: &Path) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_suffix(COMPRESSED_SUFFIX)) {
        Some(stripped) if !stripped.is_empty() && !stripped.ends_with('/') => {
            PathBuf::from(stripped)
        }
        _ => append_suffix(path, FALLBACK_SUFFIX),
    }
}

fn brotli_copy_in(input: &Path, output: &Path, quality: u32) -> std::io::Result<()> {
    let mut reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);
    let params = BrotliEncoderParams {
        quality: quality.min(MAX_BROTLI_QUALITY) as i32,
        lgwin: BROTLI_WINDOW_BITS,
        ..BrotliEncoderParams::default()
    };
    brotli::BrotliCompress(&mut reader, &mut writer, &params)?;
    writer.flush()
}

fn brotli_copy_out(input: &Path, output: &Path) -> std::io::Result<()> {
    let mut reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);
    brotli::BrotliDecompress(&mut reader, &mut writer)?;
    writer.flush()
}

pub fn compress(path: &Path, quality: u32) -> Result<PathBuf> {
    let out = compressed_path(path);
    if let Err(err) = brotli_copy_in(path, &out, quality) {
        let _ = fs::remove_file(&out);
        return Err(PipelineError::CompressionFailed(format!("{}: {err}", path.display())).into());
    }
    Ok(out)
}

pub fn decompress(path: &Path) -> Result<PathBuf> {
    let out = decompressed_path(path);
    if let Err(err) = brotli_copy_out(path, &out) {
        let _ = fs::remove_file(&out);
        return Err(
            PipelineError::DecompressionFailed(format!("{}: {err}", path.display())).into(),
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::pipeline_error;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_restores_bytes() {
        let tmp = tempdir().expect("tempdir");
        let plain = tmp.path().join("site.tar");
        let body: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&plain, &body).expect("write");

        let packed = compress(&plain, DEFAULT_BROTLI_QUALITY).expect("compress");
        assert_eq!(packed, tmp.path().join("site.tar.br"));
        assert!(fs::metadata(&packed).expect("meta").len() < body.len() as u64);

        fs::remove_file(&plain).expect("remove original");
        let restored = decompress(&packed).expect("decompress");
        assert_eq!(restored, plain);
        assert_eq!(fs::read(&restored).expect("read"), body);
    }

    #[test]
    fn output_names_follow_suffix_rules() {
        assert_eq!(
            decompressed_path(Path::new("/w/JOIN_site.br")),
            PathBuf::from("/w/JOIN_site")
        );
        assert_eq!(
            decompressed_path(Path::new("/w/blob")),
            PathBuf::from("/w/blob.unbr")
        );
        assert_eq!(
            compressed_path(Path::new("/w/site.tar")),
            PathBuf::from("/w/site.tar.br")
        );
    }

    #[test]
    fn garbage_input_fails_decompression() {
        let tmp = tempdir().expect("tempdir");
        let bogus = tmp.path().join("bogus.br");
        fs::write(&bogus, b"definitely not brotli data at all").expect("write");
        let err = decompress(&bogus).expect_err("garbage");
        assert!(matches!(
            pipeline_error(&err),
            Some(PipelineError::DecompressionFailed(_))
        ));
        assert!(!tmp.path().join("bogus").exists());
    }

    #[test]
    fn missing_input_fails_compression() {
        let tmp = tempdir().expect("tempdir");
        let err = compress(&tmp.path().join("absent"), 5).expect_err("missing");
        assert!(matches!(
            pipeline_error(&err),
            Some(PipelineError::CompressionFailed(_))
        ));
    }
}
