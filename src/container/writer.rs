//! The file-level writer: header emission, append-only frame records, and
//! the close-time sentinel + footer sequence.

use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};
use crate::frame::PackContext;
use crate::io::Write;

use super::footer;
use super::header::{Header, VERSION_2};
use super::record::{RecordHeader, HEADER_SIZE};
use super::worker::Worker;

pub struct Writer {
    header: Header,
    pack_context: PackContext,
    worker: Worker<File, ()>,
    opened: bool,
    frame_count: u32,
    file_size: u64,
    offsets: Vec<u64>,
}

impl Writer {
    /// Creates a new v2 file at `path` and writes its header immediately,
    /// flushing so a reader that opens the file concurrently in endless
    /// mode always sees a complete, valid header.
    pub fn create(
        path: impl AsRef<Path>,
        width: u32, height: u32, bpp: u32, tile_width: u32, tile_height: u32,
        metadata: Vec<u8>,
    ) -> Result<Self> {
        let header = Header::new(VERSION_2, width, height, bpp, tile_width, tile_height, metadata);
        let pack_context = header.pack_context()?;

        let mut file = File::create(path)?;
        header.write(&mut file)?;
        file.flush()?;

        let file_size = header.byte_size();
        let worker = Worker::spawn(file, "vidpak-writer");

        Ok(Self { header, pack_context, worker, opened: true, frame_count: 0, file_size, offsets: Vec::new() })
    }

    pub fn width(&self) -> u32 { self.pack_context.width() }
    pub fn height(&self) -> u32 { self.pack_context.height() }
    pub fn bpp(&self) -> u32 { self.pack_context.bpp() }
    pub fn frame_count(&self) -> u32 { self.frame_count }

    /// Packs `frame` synchronously, then hands the framed record off to the
    /// I/O worker and returns -- the caller does not wait for the bytes to
    /// actually land on disk (use `flush` or `close` for that).
    pub fn write_frame(&mut self, timestamp: u64, frame: &[u16], extra: &[u8]) -> Result<()> {
        if !self.opened {
            return Err(Error::usage("cannot write to a closed writer"));
        }

        let payload = self.pack_context.pack(frame)?;
        let record_header = RecordHeader::new(timestamp, payload.len() as u32, extra.len() as u32);

        let mut record_bytes = Vec::with_capacity(HEADER_SIZE as usize + payload.len() + extra.len());
        record_header.write(&mut record_bytes)?;
        record_bytes.extend_from_slice(&payload);
        record_bytes.extend_from_slice(extra);
        let record_len = record_bytes.len() as u64;

        self.worker.submit(Box::new(move |file: &mut File| {
            file.write_all(&record_bytes)?;
            Ok(())
        }))?;

        self.offsets.push(self.file_size);
        self.file_size += record_len;
        self.frame_count += 1;
        Ok(())
    }

    /// Waits for every write submitted so far to actually reach the file
    /// and calls `fsync` (via `File::flush`), so a concurrently-opened
    /// endless reader is guaranteed to see every frame written up to now.
    pub fn flush(&mut self) -> Result<()> {
        if !self.opened {
            return Err(Error::usage("cannot flush a closed writer"));
        }

        self.worker.submit(Box::new(|file: &mut File| {
            file.flush()?;
            Ok(())
        }))?;
        self.worker.wait()
    }

    /// Drains the worker, then (for v2 files) appends the end-of-stream
    /// sentinel and a footer index. Idempotent: closing twice is a no-op.
    /// `write_frame_pos` controls whether the footer carries the full
    /// per-frame offset table, or just the frame count.
    pub fn close(&mut self, write_frame_pos: bool) -> Result<()> {
        if !self.opened {
            return Ok(());
        }
        self.opened = false;

        if self.header.is_v2() {
            let mut sentinel_bytes = Vec::new();
            RecordHeader::sentinel().write(&mut sentinel_bytes)?;

            self.worker.submit(Box::new(move |file: &mut File| {
                file.write_all(&sentinel_bytes)?;
                Ok(())
            }))?;
            self.worker.wait()?;
            self.file_size += HEADER_SIZE;

            let footer_pos = self.file_size;
            let frame_count = self.frame_count;
            let offsets = if write_frame_pos { Some(self.offsets.clone()) } else { None };

            let mut footer_bytes = Vec::new();
            footer::write(&mut footer_bytes, frame_count, offsets.as_deref(), footer_pos)?;

            self.worker.submit(Box::new(move |file: &mut File| {
                file.write_all(&footer_bytes)?;
                file.flush()?;
                Ok(())
            }))?;
            self.worker.wait()?;
        } else {
            self.worker.submit(Box::new(|file: &mut File| {
                file.flush()?;
                Ok(())
            }))?;
            self.worker.wait()?;
        }

        self.worker.close();
        Ok(())
    }
}
