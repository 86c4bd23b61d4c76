//! Element types and typed sample storage.
use serde::{Deserialize, Serialize};

/// Scalar type a stage stores its values in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElemType {
    U8,
    U16,
    I16,
    I32,
    U32,
    F32,
}

impl ElemType {
    /// Convert a working value to this type with C cast semantics.
    ///
    /// Floats truncate toward zero before integer conversion, integers wrap
    /// modulo 2^bits and `F32` rounds to the nearest `f32`. The result is
    /// exactly representable in the target type.
    #[inline]
    pub fn narrow(self, v: f64) -> f64 {
        match self {
            ElemType::U8 => (v as i64) as u8 as f64,
            ElemType::U16 => (v as i64) as u16 as f64,
            ElemType::I16 => (v as i64) as i16 as f64,
            ElemType::I32 => (v as i64) as i32 as f64,
            ElemType::U32 => (v as i64) as u32 as f64,
            ElemType::F32 => v as f32 as f64,
        }
    }

    /// Largest finite value of the type.
    pub fn max_value(self) -> f64 {
        match self {
            ElemType::U8 => u8::MAX as f64,
            ElemType::U16 => u16::MAX as f64,
            ElemType::I16 => i16::MAX as f64,
            ElemType::I32 => i32::MAX as f64,
            ElemType::U32 => u32::MAX as f64,
            ElemType::F32 => f32::MAX as f64,
        }
    }

    pub fn size_bytes(self) -> usize {
        match self {
            ElemType::U8 => 1,
            ElemType::U16 | ElemType::I16 => 2,
            ElemType::I32 | ElemType::U32 | ElemType::F32 => 4,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ElemType::F32)
    }
}

/// Typed backing storage for a [`super::Buffer`].
#[derive(Clone, Debug, PartialEq)]
pub enum Samples {
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

macro_rules! dispatch {
    ($samples:expr, $v:ident => $body:expr) => {
        match $samples {
            Samples::U8($v) => $body,
            Samples::U16($v) => $body,
            Samples::I16($v) => $body,
            Samples::I32($v) => $body,
            Samples::U32($v) => $body,
            Samples::F32($v) => $body,
        }
    };
}

impl Samples {
    pub fn zeroed(elem: ElemType, len: usize) -> Self {
        match elem {
            ElemType::U8 => Samples::U8(vec![0; len]),
            ElemType::U16 => Samples::U16(vec![0; len]),
            ElemType::I16 => Samples::I16(vec![0; len]),
            ElemType::I32 => Samples::I32(vec![0; len]),
            ElemType::U32 => Samples::U32(vec![0; len]),
            ElemType::F32 => Samples::F32(vec![0.0; len]),
        }
    }

    pub fn elem(&self) -> ElemType {
        match self {
            Samples::U8(_) => ElemType::U8,
            Samples::U16(_) => ElemType::U16,
            Samples::I16(_) => ElemType::I16,
            Samples::I32(_) => ElemType::I32,
            Samples::U32(_) => ElemType::U32,
            Samples::F32(_) => ElemType::F32,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        dispatch!(self, v => v[i] as f64)
    }

    /// Store a value that has already been narrowed to this type.
    #[inline]
    pub fn set(&mut self, i: usize, value: f64) {
        match self {
            Samples::U8(v) => v[i] = value as u8,
            Samples::U16(v) => v[i] = value as u16,
            Samples::I16(v) => v[i] = value as i16,
            Samples::I32(v) => v[i] = value as i32,
            Samples::U32(v) => v[i] = value as u32,
            Samples::F32(v) => v[i] = value as f32,
        }
    }

    /// Copy `len` samples from `src[src_at..]` into `self[dst_at..]`.
    ///
    /// Same-typed storage is copied as a slice; mixed types go through
    /// narrowing one sample at a time.
    pub fn copy_span(&mut self, dst_at: usize, src: &Samples, src_at: usize, len: usize) {
        match (self, src) {
            (Samples::U8(d), Samples::U8(s)) => {
                d[dst_at..dst_at + len].copy_from_slice(&s[src_at..src_at + len])
            }
            (Samples::U16(d), Samples::U16(s)) => {
                d[dst_at..dst_at + len].copy_from_slice(&s[src_at..src_at + len])
            }
            (Samples::I16(d), Samples::I16(s)) => {
                d[dst_at..dst_at + len].copy_from_slice(&s[src_at..src_at + len])
            }
            (Samples::I32(d), Samples::I32(s)) => {
                d[dst_at..dst_at + len].copy_from_slice(&s[src_at..src_at + len])
            }
            (Samples::U32(d), Samples::U32(s)) => {
                d[dst_at..dst_at + len].copy_from_slice(&s[src_at..src_at + len])
            }
            (Samples::F32(d), Samples::F32(s)) => {
                d[dst_at..dst_at + len].copy_from_slice(&s[src_at..src_at + len])
            }
            (dst, src) => {
                let elem = dst.elem();
                for k in 0..len {
                    dst.set(dst_at + k, elem.narrow(src.get(src_at + k)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_follows_c_casts() {
        assert_eq!(ElemType::U8.narrow(255.9), 255.0);
        assert_eq!(ElemType::U8.narrow(256.0), 0.0);
        assert_eq!(ElemType::U8.narrow(-1.0), 255.0);
        assert_eq!(ElemType::I16.narrow(-3.7), -3.0);
        assert_eq!(ElemType::I16.narrow(40000.0), (40000i64 as i16) as f64);
        assert_eq!(ElemType::U16.narrow(70000.0), (70000 - 65536) as f64);
        assert_eq!(ElemType::F32.narrow(0.1), 0.1f32 as f64);
    }

    #[test]
    fn narrowed_values_round_trip_through_storage() {
        for elem in [
            ElemType::U8,
            ElemType::U16,
            ElemType::I16,
            ElemType::I32,
            ElemType::U32,
            ElemType::F32,
        ] {
            let mut s = Samples::zeroed(elem, 1);
            for v in [-70000.5, -1.25, 0.0, 3.5, 255.0, 1e6 + 0.3] {
                let n = elem.narrow(v);
                s.set(0, n);
                assert_eq!(s.get(0), n, "{elem:?} storing {v}");
            }
        }
    }
}
