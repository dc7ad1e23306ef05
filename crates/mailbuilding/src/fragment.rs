use crate::sevenbit::SafeByteBuffer;
use crate::Result;

/// A pull-driven source of 7-bit fragments. Output byte order is the
/// concatenation of fragments in iteration order; dropping the
/// iterator releases whatever the stream holds open.
pub trait FragmentIterator {
    fn next_fragment(&mut self) -> Result<Option<SafeByteBuffer>>;
}

pub type BoxFragmentIterator = Box<dyn FragmentIterator>;

impl FragmentIterator for BoxFragmentIterator {
    fn next_fragment(&mut self) -> Result<Option<SafeByteBuffer>> {
        (**self).next_fragment()
    }
}

/// Yields a single prebuilt buffer, then is exhausted.
pub struct ConstBuf {
    buf: Option<SafeByteBuffer>,
}

impl ConstBuf {
    pub fn new(buf: SafeByteBuffer) -> Self {
        Self { buf: Some(buf) }
    }

    pub fn from_ascii(s: &str) -> Result<Self> {
        Ok(Self::new(SafeByteBuffer::from_ascii_str(s)?))
    }
}

impl FragmentIterator for ConstBuf {
    fn next_fragment(&mut self) -> Result<Option<SafeByteBuffer>> {
        Ok(self.buf.take().filter(|b| !b.is_empty()))
    }
}

type StreamFactory = Box<dyn FnOnce() -> Result<BoxFragmentIterator>>;

/// Defers building the underlying stream until the first pull, so a
/// deep body tree opens its resources in drain order.
pub struct LazyStream {
    factory: Option<StreamFactory>,
    inner: Option<BoxFragmentIterator>,
}

impl LazyStream {
    pub fn new<F>(factory: F) -> Self
    where
        F: FnOnce() -> Result<BoxFragmentIterator> + 'static,
    {
        Self {
            factory: Some(Box::new(factory)),
            inner: None,
        }
    }
}

impl FragmentIterator for LazyStream {
    fn next_fragment(&mut self) -> Result<Option<SafeByteBuffer>> {
        if self.inner.is_none() {
            match self.factory.take() {
                Some(factory) => self.inner = Some(factory()?),
                None => return Ok(None),
            }
        }
        match &mut self.inner {
            Some(inner) => inner.next_fragment(),
            None => Ok(None),
        }
    }
}

/// Concatenates child streams: the current child is drained completely
/// before the next one is started.
pub struct SequenceStream {
    children: std::vec::IntoIter<BoxFragmentIterator>,
    current: Option<BoxFragmentIterator>,
}

impl SequenceStream {
    pub fn new(children: Vec<BoxFragmentIterator>) -> Self {
        Self {
            children: children.into_iter(),
            current: None,
        }
    }
}

impl FragmentIterator for SequenceStream {
    fn next_fragment(&mut self) -> Result<Option<SafeByteBuffer>> {
        loop {
            match self.current.take() {
                Some(mut current) => {
                    if let Some(frag) = current.next_fragment()? {
                        self.current = Some(current);
                        return Ok(Some(frag));
                    }
                }
                None => match self.children.next() {
                    Some(child) => self.current = Some(child),
                    None => return Ok(None),
                },
            }
        }
    }
}

/// Drain a stream to completion, appending to `out`.
pub fn drain_into<S: FragmentIterator>(stream: &mut S, out: &mut Vec<u8>) -> Result<u64> {
    let mut total = 0u64;
    while let Some(frag) = stream.next_fragment()? {
        total += frag.len() as u64;
        out.extend_from_slice(frag.as_bytes());
    }
    Ok(total)
}
