/// Reader and writer for numpy `.npy` array files.
use crate::error::{PreprocessError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Header blocks are padded so the data starts on this alignment.
const HEADER_ALIGN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Int,
    UInt,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dtype {
    endian: Endian,
    kind: Kind,
    size: usize,
}

impl Dtype {
    /// Parses a numpy type string such as `<f4`, `|u1` or `>i8`.
    fn parse(descr: &str) -> Result<Self, String> {
        let (endian, rest) = match descr.as_bytes().first() {
            Some(b'<') => (Endian::Little, &descr[1..]),
            Some(b'>') => (Endian::Big, &descr[1..]),
            Some(b'|') => (Endian::Little, &descr[1..]),
            Some(b'=') if cfg!(target_endian = "big") => (Endian::Big, &descr[1..]),
            Some(b'=') => (Endian::Little, &descr[1..]),
            _ => (Endian::Little, descr),
        };

        let mut chars = rest.chars();
        let kind = match chars.next() {
            Some('b') => Kind::Bool,
            Some('i') => Kind::Int,
            Some('u') => Kind::UInt,
            Some('f') => Kind::Float,
            _ => return Err(format!("unsupported dtype '{descr}'")),
        };
        let size: usize = chars
            .as_str()
            .parse()
            .map_err(|_| format!("unsupported dtype '{descr}'"))?;

        let supported = match kind {
            Kind::Bool => size == 1,
            Kind::Int | Kind::UInt => matches!(size, 1 | 2 | 4 | 8),
            Kind::Float => matches!(size, 4 | 8),
        };
        if !supported {
            return Err(format!("unsupported dtype '{descr}'"));
        }

        Ok(Self { endian, kind, size })
    }

    fn decode(&self, chunk: &[u8]) -> Scalar {
        macro_rules! read {
            ($ty:ty) => {{
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(chunk);
                match self.endian {
                    Endian::Little => <$ty>::from_le_bytes(buf),
                    Endian::Big => <$ty>::from_be_bytes(buf),
                }
            }};
        }

        match (self.kind, self.size) {
            (Kind::Bool, _) => Scalar::Int((chunk[0] != 0) as i64),
            (Kind::Int, 1) => Scalar::Int(read!(i8) as i64),
            (Kind::Int, 2) => Scalar::Int(read!(i16) as i64),
            (Kind::Int, 4) => Scalar::Int(read!(i32) as i64),
            (Kind::Int, _) => Scalar::Int(read!(i64)),
            (Kind::UInt, 1) => Scalar::UInt(read!(u8) as u64),
            (Kind::UInt, 2) => Scalar::UInt(read!(u16) as u64),
            (Kind::UInt, 4) => Scalar::UInt(read!(u32) as u64),
            (Kind::UInt, _) => Scalar::UInt(read!(u64)),
            (Kind::Float, 4) => Scalar::Float(read!(f32) as f64),
            (Kind::Float, _) => Scalar::Float(read!(f64)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Scalar {
    fn to_f64(self) -> f64 {
        match self {
            Scalar::Int(v) => v as f64,
            Scalar::UInt(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }

    /// Integer cast; floats truncate toward zero.
    fn to_i64(self) -> i64 {
        match self {
            Scalar::Int(v) => v,
            Scalar::UInt(v) => v as i64,
            Scalar::Float(v) => v as i64,
        }
    }
}

/// A dense array in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

impl<T> NpyArray<T> {
    /// Length of the leading axis, as numpy's `len()` reports it.
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    /// Number of elements per row.
    pub fn row_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    pub fn row(&self, index: usize) -> &[T] {
        let len = self.row_len();
        &self.data[index * len..(index + 1) * len]
    }
}

/// Loads an array, converting every element to `f64`.
pub fn read_f64(path: &Path) -> Result<NpyArray<f64>> {
    read_with(path, Scalar::to_f64)
}

/// Loads an array, casting every element to `i64`.
pub fn read_i64(path: &Path) -> Result<NpyArray<i64>> {
    read_with(path, Scalar::to_i64)
}

fn read_with<T>(path: &Path, convert: fn(Scalar) -> T) -> Result<NpyArray<T>> {
    let bytes = fs::read(path)?;
    decode(&bytes, convert).map_err(|reason| PreprocessError::Npy {
        path: path.to_path_buf(),
        reason,
    })
}

fn decode<T>(bytes: &[u8], convert: fn(Scalar) -> T) -> Result<NpyArray<T>, String> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err("missing npy magic string".into());
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated header".into());
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => return Err(format!("unsupported format version {v}")),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err("truncated header".into());
    }
    let header = String::from_utf8_lossy(&bytes[header_start..data_start]);
    let (dtype, fortran_order, shape) = parse_header(&header)?;

    let expected = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .and_then(|count| count.checked_mul(dtype.size).map(|bytes| (count, bytes)));
    let Some((count, expected_bytes)) = expected else {
        return Err(format!("shape {shape:?} is too large"));
    };
    let payload = &bytes[data_start..];
    if payload.len() < expected_bytes {
        return Err(format!(
            "expected {} bytes of data, found {}",
            expected_bytes,
            payload.len()
        ));
    }

    let mut data: Vec<T> = payload
        .chunks_exact(dtype.size)
        .take(count)
        .map(|chunk| convert(dtype.decode(chunk)))
        .collect();

    if fortran_order && shape.len() > 1 {
        data = fortran_to_row_major(data, &shape);
    }

    Ok(NpyArray { shape, data })
}

fn fortran_to_row_major<T>(data: Vec<T>, shape: &[usize]) -> Vec<T> {
    let mut slots: Vec<Option<T>> = data.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(slots.len());
    let mut index = vec![0usize; shape.len()];

    for _ in 0..slots.len() {
        let mut offset = 0;
        let mut stride = 1;
        for (axis, &dim) in shape.iter().enumerate() {
            offset += index[axis] * stride;
            stride *= dim;
        }
        if let Some(value) = slots[offset].take() {
            out.push(value);
        }

        // Advance the row-major multi-index.
        for axis in (0..shape.len()).rev() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }

    out
}

/// Pulls `descr`, `fortran_order` and `shape` out of the header dict literal.
fn parse_header(header: &str) -> Result<(Dtype, bool, Vec<usize>), String> {
    let descr = dict_value(header, "descr").ok_or("header has no 'descr'")?;
    let quote = descr.chars().next().ok_or("empty 'descr'")?;
    if quote != '\'' && quote != '"' {
        return Err("'descr' is not a simple type string".into());
    }
    let descr = descr[1..]
        .split(quote)
        .next()
        .ok_or("unterminated 'descr'")?;
    let dtype = Dtype::parse(descr)?;

    let fortran = dict_value(header, "fortran_order").ok_or("header has no 'fortran_order'")?;
    let fortran_order = if fortran.starts_with("True") {
        true
    } else if fortran.starts_with("False") {
        false
    } else {
        return Err("invalid 'fortran_order'".into());
    };

    let shape = dict_value(header, "shape").ok_or("header has no 'shape'")?;
    let inner = shape
        .strip_prefix('(')
        .and_then(|s| s.split(')').next())
        .ok_or("invalid 'shape'")?;
    let shape = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('L').parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid 'shape': {e}"))?;

    Ok((dtype, fortran_order, shape))
}

fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let start = header
        .find(&format!("'{key}'"))
        .or_else(|| header.find(&format!("\"{key}\"")))?;
    let rest = &header[start + key.len() + 2..];
    let colon = rest.find(':')?;
    Some(rest[colon + 1..].trim_start())
}

/// Element types that can be written as a little-endian npy array.
pub trait NpyElement: Copy {
    const DESCR: &'static str;
    fn extend_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_npy_element {
    ($ty:ty, $descr:literal) => {
        impl NpyElement for $ty {
            const DESCR: &'static str = $descr;
            fn extend_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    };
}

impl_npy_element!(f32, "<f4");
impl_npy_element!(f64, "<f8");
impl_npy_element!(i32, "<i4");
impl_npy_element!(i64, "<i8");

/// Writes `data` (row-major) as a version 1.0 npy array of the given shape.
pub fn write_npy<W, T>(writer: &mut W, shape: &[usize], data: &[T]) -> io::Result<()>
where
    W: Write,
    T: NpyElement,
{
    let count: usize = shape.iter().product();
    if count != data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("shape {shape:?} holds {count} elements, got {}", data.len()),
        ));
    }

    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        T::DESCR,
        shape_literal(shape)
    );
    // magic + version + length field + header + trailing newline
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.extend(std::iter::repeat_n(' ', padding));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "npy header too long"))?;

    let mut bytes = Vec::with_capacity(MAGIC.len() + 4 + header.len() + data.len() * 8);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&header_len.to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    for &value in data {
        value.extend_le(&mut bytes);
    }

    writer.write_all(&bytes)
}

/// Python tuple repr: `()`, `(3,)`, `(3, 10)`.
fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}
