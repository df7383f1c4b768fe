

pub use ::std::io::{Read, Write, Seek, SeekFrom};
use lebe::prelude::*;
use crate::error::{Result, UnitResult};


/// Extension trait for the little-endian primitive types used in the vidpak
/// file format and tile record layout.
pub trait Data: Sized + Default + Clone {
    fn read(read: &mut impl Read) -> Result<Self>;
    fn write(self, write: &mut impl Write) -> UnitResult;

    fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> UnitResult;
    fn write_slice(write: &mut impl Write, slice: &[Self]) -> UnitResult;

    const BYTE_SIZE: usize = ::std::mem::size_of::<Self>();

    fn read_vec(read: &mut impl Read, count: usize) -> Result<Vec<Self>> {
        let mut vec = vec![Self::default(); count];
        Self::read_slice(read, &mut vec)?;
        Ok(vec)
    }
}


macro_rules! implement_data_for_primitive {
    ($kind: ident) => {
        impl Data for $kind {
            fn read(read: &mut impl Read) -> Result<Self> {
                Ok(read.read_from_little_endian()?)
            }

            fn write(self, write: &mut impl Write) -> UnitResult {
                write.write_as_little_endian(&self)?;
                Ok(())
            }

            fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> UnitResult {
                read.read_from_little_endian_into(slice)?;
                Ok(())
            }

            fn write_slice(write: &mut impl Write, slice: &[Self]) -> UnitResult {
                write.write_as_little_endian(slice)?;
                Ok(())
            }
        }
    };
}

implement_data_for_primitive!(u8);
implement_data_for_primitive!(u16);
implement_data_for_primitive!(u32);
implement_data_for_primitive!(u64);
