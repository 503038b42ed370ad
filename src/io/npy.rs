//! NumPy `.npy` array persistence
//!
//! Writes format version 1.0 with dtype `<f4` in C order, so cached
//! spectrograms stay readable by `numpy.load`. The reader also accepts
//! version 2.0/3.0 headers, Fortran order, and `<f8` data (narrowed to f32).
//!
//! All failures are reported as `std::io::Error`; malformed content uses
//! `ErrorKind::InvalidData`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn, ShapeBuilder};

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Header (magic + version + length + dict) is padded to this alignment
const HEADER_ALIGNMENT: usize = 64;

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => format!(
            "({})",
            dims.iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Serialize an f32 array in `.npy` format
pub fn write_npy<W, S, D>(mut writer: W, array: &ArrayBase<S, D>) -> io::Result<()>
where
    W: Write,
    S: Data<Elem = f32>,
    D: Dimension,
{
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': {}, }}",
        shape_literal(array.shape())
    );

    // magic(6) + version(2) + length(2) + header + '\n'
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| invalid(format!("npy header too long: {} bytes", header.len())))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;

    // Logical iteration order is C order regardless of memory layout
    for value in array.iter() {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    F32,
    F64,
}

impl Dtype {
    fn size(self) -> usize {
        match self {
            Dtype::F32 => 4,
            Dtype::F64 => 8,
        }
    }
}

#[derive(Debug)]
struct Header {
    dtype: Dtype,
    fortran_order: bool,
    shape: Vec<usize>,
}

/// Value text following `'key':` in the header dict
fn dict_value<'a>(header: &'a str, key: &str) -> io::Result<&'a str> {
    let needle = format!("'{}':", key);
    let start = header
        .find(&needle)
        .ok_or_else(|| invalid(format!("npy header missing '{}'", key)))?;
    Ok(header[start + needle.len()..].trim_start())
}

fn parse_header(text: &str) -> io::Result<Header> {
    let descr = dict_value(text, "descr")?;
    let descr = descr
        .strip_prefix('\'')
        .and_then(|rest| rest.split('\'').next())
        .ok_or_else(|| invalid("npy descr is not a quoted string"))?;
    let dtype = match descr {
        "<f4" => Dtype::F32,
        "<f8" => Dtype::F64,
        other => return Err(invalid(format!("unsupported npy dtype '{}'", other))),
    };

    let fortran = dict_value(text, "fortran_order")?;
    let fortran_order = if fortran.starts_with("True") {
        true
    } else if fortran.starts_with("False") {
        false
    } else {
        return Err(invalid("npy fortran_order is not a boolean"));
    };

    let shape_text = dict_value(text, "shape")?;
    let inner = shape_text
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
        .ok_or_else(|| invalid("npy shape is not a tuple"))?;
    let shape = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| invalid(format!("invalid npy dimension '{}'", s)))
        })
        .collect::<io::Result<Vec<_>>>()?;

    Ok(Header {
        dtype,
        fortran_order,
        shape,
    })
}

/// Deserialize an `.npy` stream into a dynamic-dimensional f32 array
pub fn read_npy<R: Read>(mut reader: R) -> io::Result<ArrayD<f32>> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(invalid("not an npy file (bad magic)"));
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len = match version[0] {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        major => return Err(invalid(format!("unsupported npy version {}", major))),
    };

    let mut header_bytes = vec![0u8; header_len];
    reader.read_exact(&mut header_bytes)?;
    let header_text =
        String::from_utf8(header_bytes).map_err(|_| invalid("npy header is not UTF-8"))?;
    let header = parse_header(&header_text)?;

    let count = header
        .shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| invalid(format!("npy shape {:?} overflows", header.shape)))?;
    let byte_len = count
        .checked_mul(header.dtype.size())
        .ok_or_else(|| invalid(format!("npy shape {:?} overflows", header.shape)))?;

    // Allocation follows the bytes actually present, not the header's claim
    let mut data = Vec::new();
    reader
        .take((byte_len as u64).saturating_add(1))
        .read_to_end(&mut data)?;
    if data.len() != byte_len {
        return Err(invalid(format!(
            "npy data size mismatch: expected {} values ({} bytes), found {} bytes",
            count,
            byte_len,
            data.len()
        )));
    }

    let values: Vec<f32> = match header.dtype {
        Dtype::F32 => data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        Dtype::F64 => data
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect(),
    };

    let shape = IxDyn(&header.shape);
    let array = if header.fortran_order {
        ArrayD::from_shape_vec(shape.f(), values)
    } else {
        ArrayD::from_shape_vec(shape, values)
    };
    array.map_err(|e| invalid(format!("npy shape error: {}", e)))
}

/// Write an array to `path` in `.npy` format
pub fn save<S, D>(path: &Path, array: &ArrayBase<S, D>) -> io::Result<()>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let file = File::create(path)?;
    write_npy(BufWriter::new(file), array)
}

/// Read an `.npy` file into a dynamic-dimensional array
pub fn load(path: &Path) -> io::Result<ArrayD<f32>> {
    let file = File::open(path)?;
    read_npy(BufReader::new(file))
}
