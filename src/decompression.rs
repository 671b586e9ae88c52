use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Chain, Cursor, Read};
use std::path::Path;

type ChainReader = Chain<Cursor<Vec<u8>>, File>;

/// Line reader over an input file, transparently decompressing gzip and zstd.
///
/// The format is detected from magic bytes (gzip `1F 8B 08`, zstd `28 B5 2F FD`),
/// not from the extension.
pub enum InputReader {
    Gzip(BufReader<MultiGzDecoder<ChainReader>>),
    Zstd(BufReader<zstd::Decoder<'static, BufReader<ChainReader>>>),
    Plain(BufReader<ChainReader>),
}

impl std::fmt::Debug for InputReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputReader::Gzip(_) => write!(f, "InputReader::Gzip"),
            InputReader::Zstd(_) => write!(f, "InputReader::Zstd"),
            InputReader::Plain(_) => write!(f, "InputReader::Plain"),
        }
    }
}

impl Read for InputReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            InputReader::Gzip(reader) => reader.read(buf),
            InputReader::Zstd(reader) => reader.read(buf),
            InputReader::Plain(reader) => reader.read(buf),
        }
    }
}

impl BufRead for InputReader {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        match self {
            InputReader::Gzip(reader) => reader.fill_buf(),
            InputReader::Zstd(reader) => reader.fill_buf(),
            InputReader::Plain(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            InputReader::Gzip(reader) => reader.consume(amt),
            InputReader::Zstd(reader) => reader.consume(amt),
            InputReader::Plain(reader) => reader.consume(amt),
        }
    }
}

impl InputReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

        let mut head = [0u8; 4];
        let n = read_head(&mut file, &mut head)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        // Put the sniffed bytes back in front of the file
        let chained = Cursor::new(head[..n].to_vec()).chain(file);

        let is_gzip = n >= 3 && head[..3] == [0x1F, 0x8B, 0x08];
        let is_zstd = n >= 4 && head == [0x28, 0xB5, 0x2F, 0xFD];

        if is_gzip {
            Ok(InputReader::Gzip(BufReader::new(MultiGzDecoder::new(chained))))
        } else if is_zstd {
            let decoder = zstd::Decoder::new(chained)
                .with_context(|| format!("Failed to start zstd stream for {}", path.display()))?;
            Ok(InputReader::Zstd(BufReader::new(decoder)))
        } else {
            Ok(InputReader::Plain(BufReader::new(chained)))
        }
    }
}

// A single read() may return fewer bytes than available; keep going until the
// buffer is full or EOF.
fn read_head(file: &mut File, head: &mut [u8; 4]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < head.len() {
        match file.read(&mut head[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
