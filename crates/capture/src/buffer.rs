//! Frame buffer - bounded, overwrite-oldest handoff between capture and publish
//!
//! A full buffer never blocks the producer: the oldest queued frame is evicted
//! to make room. Closing the writer lets the reader drain what is left and then
//! observe the end of the stream.

use async_channel::{bounded, Receiver, Sender};
use contracts::{ContractError, Frame};

/// Create a frame buffer holding at most `capacity` frames (minimum 1)
pub fn frame_buffer(capacity: usize) -> (FrameWriter, FrameReader) {
    let (tx, rx) = bounded(capacity.max(1));
    (FrameWriter { tx }, FrameReader { rx })
}

/// Producer side
#[derive(Debug)]
pub struct FrameWriter {
    tx: Sender<Frame>,
}

impl FrameWriter {
    /// Insert a frame, evicting the oldest one if the buffer is full
    ///
    /// Returns the sequence number of the evicted frame, if any.
    ///
    /// # Errors
    /// `BufferClosed` once the buffer has been closed
    pub fn put(&self, frame: Frame) -> Result<Option<u64>, ContractError> {
        let frame_seq = frame.seq;
        match self.tx.force_send(frame) {
            Ok(evicted) => Ok(evicted.map(|old| old.seq)),
            Err(_) => Err(ContractError::BufferClosed { frame_seq }),
        }
    }

    /// Signal end of stream; queued frames stay readable
    pub fn close(&self) {
        self.tx.close();
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(1)
    }
}

/// Consumer side
#[derive(Debug)]
pub struct FrameReader {
    rx: Receiver<Frame>,
}

impl FrameReader {
    /// Wait for the oldest queued frame
    ///
    /// Returns `None` once the buffer is closed and drained.
    pub async fn get(&self) -> Option<Frame> {
        self.rx.recv().await.ok()
    }

    /// Take the oldest queued frame without waiting
    pub fn try_get(&self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Closed and drained
    pub fn is_finished(&self) -> bool {
        self.rx.is_closed() && self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::time::Duration;

    fn frame(seq: u64) -> Frame {
        Frame::new(seq, Duration::from_millis(seq * 100), RgbImage::new(2, 2))
    }

    #[test]
    fn test_fifo_order() {
        let (writer, reader) = frame_buffer(2);
        assert_eq!(writer.put(frame(1)).unwrap(), None);
        assert_eq!(writer.put(frame(2)).unwrap(), None);

        assert_eq!(reader.try_get().unwrap().seq, 1);
        assert_eq!(reader.try_get().unwrap().seq, 2);
        assert!(reader.try_get().is_none());
    }

    #[test]
    fn test_full_buffer_evicts_oldest() {
        let (writer, reader) = frame_buffer(2);
        writer.put(frame(1)).unwrap();
        writer.put(frame(2)).unwrap();

        assert_eq!(writer.put(frame(3)).unwrap(), Some(1));
        assert_eq!(writer.len(), 2);

        assert_eq!(reader.try_get().unwrap().seq, 2);
        assert_eq!(reader.try_get().unwrap().seq, 3);
    }

    #[test]
    fn test_capacity_zero_is_one() {
        let (writer, reader) = frame_buffer(0);
        assert_eq!(writer.capacity(), 1);
        writer.put(frame(1)).unwrap();
        assert_eq!(writer.put(frame(2)).unwrap(), Some(1));
        assert_eq!(reader.len(), 1);
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let (writer, reader) = frame_buffer(2);
        writer.put(frame(7)).unwrap();
        writer.close();

        assert!(writer.is_closed());
        assert!(matches!(
            writer.put(frame(8)),
            Err(ContractError::BufferClosed { frame_seq: 8 })
        ));

        assert_eq!(reader.get().await.unwrap().seq, 7);
        assert!(reader.get().await.is_none());
        assert!(reader.is_finished());
    }

    #[tokio::test]
    async fn test_dropping_writer_ends_stream() {
        let (writer, reader) = frame_buffer(2);
        writer.put(frame(1)).unwrap();
        drop(writer);

        assert_eq!(reader.get().await.unwrap().seq, 1);
        assert!(reader.get().await.is_none());
    }

    #[tokio::test]
    async fn test_get_waits_for_frame() {
        let (writer, reader) = frame_buffer(2);
        let handle = tokio::spawn(async move { reader.get().await.map(|f| f.seq) });

        tokio::time::sleep(Duration::from_millis(10)).await;
        writer.put(frame(42)).unwrap();

        assert_eq!(handle.await.unwrap(), Some(42));
    }
}
