use crate::{ContainerError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use isobar_codec::{EncodedBlock, ResidualStream};
use isobar_grid::{DType, Shape};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;
use tracing::debug;

pub const MAGIC: [u8; 4] = *b"ISBR";
pub const FORMAT_VERSION: u16 = 1;

/// Grid description needed to rebuild the node mapping and decode residuals.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub shape: Shape,
    pub dtype: DType,
    pub error_bound: f64,
    pub quantum: f64,
}

/// Header + latent blob + residual bitstream.
///
/// The latent blob is opaque here; it is produced and consumed by the latent
/// model. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedContainer {
    header: Header,
    latent: Vec<u8>,
    residual: ResidualStream,
}

/// Maps an early EOF onto a truncation error naming the section.
fn truncated(section: &'static str) -> impl FnOnce(io::Error) -> ContainerError {
    move |err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ContainerError::format(format!("truncated {}", section))
        } else {
            ContainerError::Io(err)
        }
    }
}

/// Read exactly `len` bytes without trusting `len` for the allocation.
fn read_section<R: Read>(r: &mut R, len: u64, section: &'static str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(ContainerError::format(format!(
            "truncated {}: expected {} bytes, found {}",
            section,
            len,
            buf.len()
        )));
    }
    Ok(buf)
}

fn check_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ContainerError::format(format!("{} {} does not fit in u32", what, value)))
}

impl CompressedContainer {
    /// Bundle a latent blob and residual stream for a grid of `shape`/`dtype`.
    /// The header's bound and quantum are taken from the stream.
    pub fn new(shape: Shape, dtype: DType, latent: Vec<u8>, residual: ResidualStream) -> Self {
        let header = Header {
            shape,
            dtype,
            error_bound: residual.error_bound,
            quantum: residual.quantum,
        };
        Self {
            header,
            latent,
            residual,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn latent(&self) -> &[u8] {
        &self.latent
    }

    pub fn residual(&self) -> &ResidualStream {
        &self.residual
    }

    pub fn into_parts(self) -> (Header, Vec<u8>, ResidualStream) {
        (self.header, self.latent, self.residual)
    }

    /// Exact serialized size in bytes.
    pub fn encoded_len(&self) -> usize {
        let header = 4 + 2 + 1 + 4 * self.header.shape.ndim() + 1 + 8 + 8;
        let latent = 8 + self.latent.len();
        let blocks: usize = self
            .residual
            .blocks
            .iter()
            .map(|b| 4 + 1 + 2 + 4 + b.payload.len())
            .sum();
        header + latent + 4 + blocks
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let dims = self.header.shape.dims();
        let ndim = u8::try_from(dims.len())
            .map_err(|_| ContainerError::format(format!("{} dimensions exceed 255", dims.len())))?;

        w.write_all(&MAGIC)?;
        w.write_u16::<LittleEndian>(FORMAT_VERSION)?;
        w.write_u8(ndim)?;
        for &d in dims {
            w.write_u32::<LittleEndian>(check_u32(d, "dimension")?)?;
        }
        w.write_u8(self.header.dtype.tag())?;
        w.write_f64::<LittleEndian>(self.header.error_bound)?;
        w.write_f64::<LittleEndian>(self.header.quantum)?;

        w.write_u64::<LittleEndian>(self.latent.len() as u64)?;
        w.write_all(&self.latent)?;

        w.write_u32::<LittleEndian>(check_u32(self.residual.blocks.len(), "block count")?)?;
        for block in &self.residual.blocks {
            w.write_u32::<LittleEndian>(block.block_id)?;
            w.write_u8(block.bit_width)?;
            w.write_u16::<LittleEndian>(block.escape_count)?;
            w.write_u32::<LittleEndian>(check_u32(block.payload.len(), "code length")?)?;
            w.write_all(&block.payload)?;
        }
        Ok(())
    }

    /// Read one container. Bytes after it are left in `r`.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic).map_err(truncated("magic"))?;
        if magic != MAGIC {
            return Err(ContainerError::format(format!("bad magic {:?}", magic)));
        }
        let version = r.read_u16::<LittleEndian>().map_err(truncated("version"))?;
        if version != FORMAT_VERSION {
            return Err(ContainerError::format(format!("unsupported version {}", version)));
        }

        let ndim = r.read_u8().map_err(truncated("header"))? as usize;
        let mut dims = Vec::with_capacity(ndim);
        for _ in 0..ndim {
            dims.push(r.read_u32::<LittleEndian>().map_err(truncated("header"))? as usize);
        }
        let shape = Shape::new(&dims).map_err(|e| ContainerError::format(e.to_string()))?;

        let tag = r.read_u8().map_err(truncated("header"))?;
        let dtype = DType::from_tag(tag)
            .ok_or_else(|| ContainerError::format(format!("unknown dtype tag {}", tag)))?;
        let error_bound = r.read_f64::<LittleEndian>().map_err(truncated("header"))?;
        let quantum = r.read_f64::<LittleEndian>().map_err(truncated("header"))?;
        if !error_bound.is_finite() || error_bound < 0.0 || !quantum.is_finite() || quantum < 0.0 {
            return Err(ContainerError::format(format!(
                "invalid bound {} / quantum {}",
                error_bound, quantum
            )));
        }

        let latent_len = r.read_u64::<LittleEndian>().map_err(truncated("latent length"))?;
        let latent = read_section(r, latent_len, "latent")?;

        let num_blocks = r.read_u32::<LittleEndian>().map_err(truncated("block count"))? as usize;
        if num_blocks == 0 || num_blocks > shape.len() {
            return Err(ContainerError::format(format!(
                "{} blocks for {} cells",
                num_blocks,
                shape.len()
            )));
        }
        // Balanced blocks hold ceil(cells / blocks) cells, at most u16::MAX.
        let block_len = shape.len().div_ceil(num_blocks);
        if block_len > u16::MAX as usize {
            return Err(ContainerError::format(format!(
                "{} blocks cannot cover {} cells of at most {} each",
                num_blocks,
                shape.len(),
                u16::MAX
            )));
        }
        let mut blocks = Vec::with_capacity(num_blocks);
        for _ in 0..num_blocks {
            let block_id = r.read_u32::<LittleEndian>().map_err(truncated("block header"))?;
            let bit_width = r.read_u8().map_err(truncated("block header"))?;
            let escape_count = r.read_u16::<LittleEndian>().map_err(truncated("block header"))?;
            let code_len = r.read_u32::<LittleEndian>().map_err(truncated("block header"))?;
            let payload = read_section(r, code_len as u64, "residual codes")?;
            blocks.push(EncodedBlock {
                block_id,
                bit_width,
                escape_count,
                payload,
            });
        }

        debug!(
            dims = ?shape.dims(),
            latent_bytes = latent.len(),
            blocks = blocks.len(),
            "Read container"
        );

        Ok(Self {
            header: Header {
                shape,
                dtype,
                error_bound,
                quantum,
            },
            latent,
            residual: ResidualStream {
                error_bound,
                quantum,
                blocks,
            },
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Parse a complete artifact; trailing bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let container = Self::read_from(&mut cursor)?;
        let consumed = cursor.position() as usize;
        if consumed != bytes.len() {
            return Err(ContainerError::format(format!(
                "{} trailing bytes",
                bytes.len() - consumed
            )));
        }
        Ok(container)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut w = BufWriter::new(File::create(path.as_ref())?);
        self.write_to(&mut w)?;
        w.flush()?;
        debug!(path = %path.as_ref().display(), bytes = self.encoded_len(), "Saved container");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut bytes = Vec::new();
        BufReader::new(File::open(path.as_ref())?).read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }
}
