//! Bytecode image framing: signature, version, constant table and module
//! blocks — plus the checked reader the VM loads images through.

use crate::compiler::consts::ConstTable;
use crate::compiler::emitter::Emitter;
use crate::compiler::opcode::OpCode;
use crate::error::{CompileResult, ErrorCode, QuillError, VmResult};
use crate::span::Span;

/// Image signature bytes, written after the `signature` opcode.
pub const SIGNATURE: [u8; 4] = [8, 5, 20, 21];
/// Format version bytes, written after the `version` opcode.
pub const VERSION: [u8; 4] = [0, 1, 0, 0];

/// Frame a finished compilation into one image.
///
/// Layout: `signature` + 4 bytes, `version` + 4 bytes, `constTable` +
/// pools, then per module: `module`, short-string key, `u8` library-entry
/// flag, statement stream, `endOfModule`.
pub fn frame_image(
    consts: &ConstTable,
    modules: Vec<(String, bool, Emitter)>,
) -> CompileResult<Vec<u8>> {
    let mut out = Emitter::new();

    out.write_op(OpCode::Signature);
    for byte in SIGNATURE {
        out.write_u8(byte);
    }
    out.write_op(OpCode::Version);
    for byte in VERSION {
        out.write_u8(byte);
    }

    out.write_op(OpCode::ConstTable);
    out.write_u16(consts.ints.len() as u16);
    for &value in &consts.ints {
        out.write_i64(value);
    }
    out.write_u16(consts.floats.len() as u16);
    for &value in &consts.floats {
        out.write_f64(value);
    }
    out.write_u16(consts.strings.len() as u16);
    for value in &consts.strings {
        out.write_long_str(value, Span::default())?;
    }

    for (key, is_entry, code) in modules {
        out.write_op(OpCode::Module);
        out.write_short_str(&key, Span::default())?;
        out.write_bool(is_entry);
        out.append(code);
        out.write_op(OpCode::EndOfModule);
    }

    Ok(out.into_bytes())
}

/// A loaded bytecode image: validated header, parsed constant pools, and
/// the offset of the first module block. Module boundaries are discovered
/// by the VM as it executes.
#[derive(Debug, Clone)]
pub struct BytecodeImage {
    pub bytes: Vec<u8>,
    pub ints: Vec<i64>,
    pub floats: Vec<f64>,
    pub strings: Vec<String>,
    /// Offset of the first `module` opcode.
    pub code_start: usize,
}

impl BytecodeImage {
    /// Validate the header and parse the constant table.
    pub fn load(bytes: Vec<u8>) -> VmResult<Self> {
        let mut reader = ImageReader::new(&bytes);

        reader.expect_op(OpCode::Signature)?;
        let signature = reader.read_array::<4>()?;
        if signature != SIGNATURE {
            return Err(QuillError::new(
                ErrorCode::BytecodeSignature,
                format!("bad bytecode signature {:?}", signature),
                Span::default(),
            ));
        }
        reader.expect_op(OpCode::Version)?;
        let version = reader.read_array::<4>()?;
        if version != VERSION {
            return Err(QuillError::new(
                ErrorCode::BytecodeVersion,
                format!(
                    "unsupported bytecode version {:?} (expected {:?})",
                    version, VERSION
                ),
                Span::default(),
            ));
        }

        reader.expect_op(OpCode::ConstTable)?;
        let int_count = reader.read_u16()? as usize;
        let mut ints = Vec::with_capacity(int_count);
        for _ in 0..int_count {
            ints.push(i64::from_be_bytes(reader.read_array::<8>()?));
        }
        let float_count = reader.read_u16()? as usize;
        let mut floats = Vec::with_capacity(float_count);
        for _ in 0..float_count {
            floats.push(f64::from_be_bytes(reader.read_array::<8>()?));
        }
        let string_count = reader.read_u16()? as usize;
        let mut strings = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            let length = reader.read_u16()? as usize;
            strings.push(reader.read_str(length)?);
        }

        let code_start = reader.position;
        Ok(Self {
            bytes,
            ints,
            floats,
            strings,
            code_start,
        })
    }
}

/// Cursor over raw image bytes with bounds checking.
struct ImageReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ImageReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn truncated() -> QuillError {
        QuillError::new(
            ErrorCode::BytecodeSignature,
            "truncated bytecode image",
            Span::default(),
        )
    }

    fn read_u8(&mut self) -> VmResult<u8> {
        let byte = *self
            .bytes
            .get(self.position)
            .ok_or_else(Self::truncated)?;
        self.position += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> VmResult<u16> {
        Ok(u16::from_be_bytes(self.read_array::<2>()?))
    }

    fn read_array<const N: usize>(&mut self) -> VmResult<[u8; N]> {
        if self.position + N > self.bytes.len() {
            return Err(Self::truncated());
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.position..self.position + N]);
        self.position += N;
        Ok(out)
    }

    fn read_str(&mut self, length: usize) -> VmResult<String> {
        if self.position + length > self.bytes.len() {
            return Err(Self::truncated());
        }
        let slice = &self.bytes[self.position..self.position + length];
        self.position += length;
        String::from_utf8(slice.to_vec()).map_err(|_| {
            QuillError::new(
                ErrorCode::BytecodeSignature,
                "invalid UTF-8 in bytecode string pool",
                Span::default(),
            )
        })
    }

    fn expect_op(&mut self, op: OpCode) -> VmResult<()> {
        let byte = self.read_u8()?;
        if byte != op as u8 {
            return Err(QuillError::new(
                ErrorCode::BytecodeSignature,
                format!("expected {:?} opcode, found byte {}", op, byte),
                Span::default(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_image() -> Vec<u8> {
        let consts = ConstTable::new();
        frame_image(&consts, Vec::new()).unwrap()
    }

    #[test]
    fn test_roundtrip_header() {
        let mut consts = ConstTable::new();
        consts.intern_int(7);
        consts.intern_float(1.5);
        consts.intern_string("hi");
        let bytes = frame_image(&consts, Vec::new()).unwrap();
        let image = BytecodeImage::load(bytes).unwrap();
        assert_eq!(image.ints, vec![7]);
        assert_eq!(image.floats, vec![1.5]);
        assert_eq!(image.strings, vec!["hi".to_string()]);
        assert_eq!(image.code_start, image.bytes.len());
    }

    #[test]
    fn test_bad_signature() {
        let mut bytes = empty_image();
        bytes[1] = 9;
        let err = BytecodeImage::load(bytes).unwrap_err();
        assert_eq!(err.code, ErrorCode::BytecodeSignature);
    }

    #[test]
    fn test_bad_version() {
        let mut bytes = empty_image();
        bytes[6] = 99;
        let err = BytecodeImage::load(bytes).unwrap_err();
        assert_eq!(err.code, ErrorCode::BytecodeVersion);
    }

    #[test]
    fn test_truncated_image() {
        let bytes = empty_image();
        let err = BytecodeImage::load(bytes[..4].to_vec()).unwrap_err();
        assert_eq!(err.code, ErrorCode::BytecodeSignature);
    }
}
