use core::{mem, ptr};

/// A wire header that can be copied out of packet memory.
///
/// # Safety
///
/// Every bit pattern of `size_of::<Self>()` bytes must be a valid `Self`.
/// Alignment does not matter: headers are read with an unaligned load.
pub unsafe trait Header: Sized {
    const LEN: usize = mem::size_of::<Self>();
}

unsafe impl Header for u8 {}
unsafe impl<const N: usize> Header for [u8; N] {}

/// A contiguous, non-owned packet buffer delimited by two addresses.
///
/// The only way to read a header is [`PacketView::load`], which checks the
/// whole window against `end()` first.
pub trait PacketView {
    fn start(&self) -> usize;
    fn end(&self) -> usize;

    #[inline(always)]
    fn len(&self) -> usize {
        self.end() - self.start()
    }

    #[inline(always)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the header of type `T` at `offset`, or returns `None` if it
    /// does not fit in the buffer.
    #[inline(always)]
    fn load<T: Header>(&self, offset: usize) -> Option<T> {
        let start = self.start();
        let end = self.end();

        if start + offset + T::LEN > end {
            return None;
        }

        // Bounds checked above, and any bytes make a valid `T`.
        Some(unsafe { ptr::read_unaligned((start + offset) as *const T) })
    }
}

/// A [`PacketView`] over a byte slice.
#[derive(Clone, Copy)]
pub struct SliceView<'a> {
    data: &'a [u8],
}

impl<'a> SliceView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceView { data }
    }
}

impl PacketView for SliceView<'_> {
    #[inline(always)]
    fn start(&self) -> usize {
        self.data.as_ptr() as usize
    }

    #[inline(always)]
    fn end(&self) -> usize {
        self.start() + self.data.len()
    }
}
