use flate2::read::MultiGzDecoder;
use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Opens `input_filename` for buffered line reading, decompressing `.gz` and `.zst` files.
/// Any other extension is read as plain text.
pub fn create_buffered_input(input_filename: &str) -> Result<Box<dyn BufRead>, Box<dyn Error>> {
    let input = match File::open(input_filename) {
        Ok(f) => f,
        Err(e) => return Err(format!("Cannot open input file {}: {}", input_filename, e))?,
    };

    let extension = Path::new(input_filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let reader: Box<dyn BufRead> = match extension {
        "gz" => Box::new(BufReader::new(MultiGzDecoder::new(input))),
        "zst" => Box::new(BufReader::new(zstd::stream::read::Decoder::new(input)?)),
        _ => Box::new(BufReader::new(input)),
    };
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::tempdir;

    const CONTENT: &str = "1 1:1 2:0.5\n0 3:1\n";

    fn read_all(path: &str) -> String {
        let mut reader = create_buffered_input(path).unwrap();
        let mut out = String::new();
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap() > 0 {
            out.push_str(&line);
            line.clear();
        }
        out
    }

    #[test]
    fn test_plain_gz_and_zst_inputs() {
        let dir = tempdir().unwrap();

        let plain = dir.path().join("train.txt");
        std::fs::write(&plain, CONTENT).unwrap();
        assert_eq!(read_all(plain.to_str().unwrap()), CONTENT);

        let gz = dir.path().join("train.txt.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(CONTENT.as_bytes()).unwrap();
        encoder.finish().unwrap();
        assert_eq!(read_all(gz.to_str().unwrap()), CONTENT);

        let zst = dir.path().join("train.txt.zst");
        let compressed = zstd::stream::encode_all(CONTENT.as_bytes(), 3).unwrap();
        std::fs::write(&zst, compressed).unwrap();
        assert_eq!(read_all(zst.to_str().unwrap()), CONTENT);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.txt");
        assert!(create_buffered_input(missing.to_str().unwrap()).is_err());
    }
}
