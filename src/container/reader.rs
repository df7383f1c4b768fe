//! The file-level reader: header parse with footer-recovery fast path,
//! header-scan fallback, `read_frame`'s wait/schedule/prefetch dance, and
//! `count_frames`'s "always `None` while endless" contract.

use std::fs::File;
use std::path::Path;

use crate::error::{u64_to_usize, Error, Result};
use crate::frame::PackContext;
use crate::io::{Read, Seek, SeekFrom};

use super::footer;
use super::header::Header;
use super::record::{self, RecordHeader};
use super::worker::{Job, Worker};

/// `read_frame`'s `prefetch` parameter: a bare `false` disables prefetch,
/// `true` prefetches the next frame, and any explicit index prefetches that
/// frame instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefetch {
    Disabled,
    Next,
    At(u64),
}

impl From<bool> for Prefetch {
    fn from(enabled: bool) -> Self {
        if enabled { Prefetch::Next } else { Prefetch::Disabled }
    }
}

impl From<u64> for Prefetch {
    fn from(index: u64) -> Self {
        Prefetch::At(index)
    }
}

#[derive(Clone, Copy)]
struct CacheEntry {
    offset: u64,
    header: RecordHeader,
}

enum ScanOutcome {
    Record(RecordHeader),
    Sentinel,
    Incomplete,
}

pub struct Reader {
    header: Header,
    pack_context: PackContext,
    worker: Worker<File, Vec<u8>>,
    opened: bool,

    /// Header-scan state: the offset to resume scanning from, and every
    /// record header successfully scanned so far, indexed by frame index.
    scan_offset: u64,
    cache: Vec<CacheEntry>,
    /// Set once the header-scan itself has read the v2 sentinel record --
    /// distinct from `known_frame_count.is_some()`, which can become `Some`
    /// via footer recovery alone (no offset table) while the scan cache is
    /// still empty and has yet to catch up. Gates the scan loop: scanning
    /// must keep going whenever the cache is short of where it needs to be,
    /// even if the frame count is already known from the footer.
    scan_finished: bool,

    /// Known from a successfully recovered v2 footer.
    known_frame_count: Option<u64>,
    offsets: Option<Vec<u64>>,

    /// The frame index whose payload read is currently in flight on the
    /// worker (either because `read_frame` just scheduled it, or because a
    /// previous call's `prefetch` left it running).
    scheduled_index: Option<u64>,
    scheduled_header: Option<RecordHeader>,
}

impl Reader {
    /// Opens `path`, parses its fixed header, and -- for v2 files -- attempts
    /// footer recovery. Any footer mismatch or truncation falls back silently
    /// to header-scan mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;
        let header = Header::read(&mut file)?;
        let pack_context = header.pack_context()?;
        let scan_offset = header.byte_size();

        let (known_frame_count, offsets, scan_finished) = if header.is_v2() {
            let file_len = file.seek(SeekFrom::End(0))?;
            match footer::try_recover(&mut file, file_len) {
                // A full offset table means the scan cache is never needed;
                // without one, the cache still has to be built by scanning,
                // even though the frame count is already known.
                Some(index) => {
                    let scan_finished = index.offsets.is_some();
                    (Some(index.frame_count as u64), index.offsets, scan_finished)
                }
                None => (None, None, false),
            }
        } else {
            (None, None, false)
        };

        let worker = Worker::spawn(file, "vidpak-reader");

        Ok(Self {
            header, pack_context, worker, opened: true,
            scan_offset, cache: Vec::new(), scan_finished,
            known_frame_count, offsets,
            scheduled_index: None, scheduled_header: None,
        })
    }

    pub fn width(&self) -> u32 { self.pack_context.width() }
    pub fn height(&self) -> u32 { self.pack_context.height() }
    pub fn bpp(&self) -> u32 { self.pack_context.bpp() }
    pub fn metadata(&self) -> &[u8] { &self.header.metadata }

    /// `true` until a v2 sentinel has been scanned or a v2 footer recovered,
    /// i.e. while the total frame count is still unknown because the file
    /// may still be actively appended to.
    pub fn is_endless(&self) -> bool {
        self.known_frame_count.is_none() && !self.scan_finished
    }

    /// Returns `(timestamp, frame, extra)` for the frame at `index`.
    ///
    /// Algorithm:
    /// 1. If the worker is not currently reading `index`, wait out whatever
    ///    it is doing, then schedule `index`.
    /// 2. Wait for the scheduled read.
    /// 3. If `prefetch` asks for it, schedule that index next and detach.
    /// 4. Synchronously unpack the buffered payload.
    pub fn read_frame(
        &mut self,
        index: u64,
        out_frame: Option<&mut [u16]>,
        prefetch: impl Into<Prefetch>,
    ) -> Result<(u64, Vec<u16>, Vec<u8>)> {
        if !self.opened {
            return Err(Error::usage("cannot read from a reader that has recorded an I/O failure"));
        }

        if self.scheduled_index != Some(index) {
            if self.scheduled_index.is_some() {
                // Stale prefetch for a different index: wait it out and
                // discard its bytes, surfacing any error it hit.
                self.wait_discard()?;
            }

            let (offset, header) = self.locate(index)?;
            self.submit_payload_read(offset, &header)?;
            self.scheduled_index = Some(index);
            self.scheduled_header = Some(header);
        }

        let bytes = self.wait_bytes()?;
        self.scheduled_index = None;
        let header = self.scheduled_header.take().expect("header recorded alongside the scheduled job");

        let data_size = u64_to_usize(header.data_size as u64);
        if bytes.len() < data_size {
            return Err(Error::malformed("frame record payload is shorter than its declared size"));
        }

        let payload = &bytes[..data_size];
        let extra = bytes[data_size..].to_vec();
        let frame = self.pack_context.unpack(payload)?;

        if let Some(out) = out_frame {
            if out.len() != frame.len() {
                return Err(Error::usage("out_frame buffer does not match this reader's geometry"));
            }
            out.copy_from_slice(&frame);
        }

        match prefetch.into() {
            Prefetch::Disabled => {}
            Prefetch::Next => self.try_schedule_prefetch(index + 1),
            Prefetch::At(next) => self.try_schedule_prefetch(next),
        }

        Ok((header.timestamp, frame, extra))
    }

    /// Counts the frames physically present so far. Returns `None` while
    /// still in endless mode -- the count is definitionally unknown until
    /// the writer signals end-of-stream.
    pub fn count_frames(&mut self, max_counted: Option<u64>) -> Result<Option<u64>> {
        if !self.opened {
            return Err(Error::usage("cannot read from a reader that has recorded an I/O failure"));
        }

        if let Some(known) = self.known_frame_count {
            return Ok(Some(known));
        }

        let target = match max_counted {
            Some(additional) => self.cache.len() as u64 + additional,
            None => u64::MAX,
        };

        self.scan_until(target)?;

        if self.scan_finished {
            Ok(Some(self.cache.len() as u64))
        } else {
            Ok(None)
        }
    }

    fn try_schedule_prefetch(&mut self, index: u64) {
        // A prefetch that can't yet be located (endless mode still catching
        // up) or fails to submit is silently skipped -- it's an optimization
        // hint, not a request that's expected to always succeed.
        if let Ok((offset, header)) = self.locate(index) {
            if self.submit_payload_read(offset, &header).is_ok() {
                self.scheduled_index = Some(index);
                self.scheduled_header = Some(header);
            }
        }
    }

    /// Resolves `index` to its absolute record-header offset and parsed
    /// header, via the footer's offset table when available, or by
    /// extending the header-scan cache otherwise.
    fn locate(&mut self, index: u64) -> Result<(u64, RecordHeader)> {
        if let Some(frame_count) = self.known_frame_count {
            if index >= frame_count {
                return Err(Error::frame_not_present(index, Some(frame_count)));
            }

            if let Some(offsets) = self.offsets.clone() {
                let offset = offsets[u64_to_usize(index)];
                let header = self.read_header_at(offset)?;
                return Ok((offset, header));
            }
        }

        // Scan to extend the cache even when the footer already gave us
        // `known_frame_count` -- a footer without an offset table only
        // pins the total, it does not spare the reader from locating each
        // record's byte offset itself.
        self.scan_until(index + 1)?;

        if let Some(entry) = self.cache.get(u64_to_usize(index)) {
            return Ok((entry.offset, entry.header));
        }

        let frame_count = self.known_frame_count
            .or_else(|| if self.scan_finished { Some(self.cache.len() as u64) } else { None });
        Err(Error::frame_not_present(index, frame_count))
    }

    fn scan_until(&mut self, target_len: u64) -> Result<()> {
        while (self.cache.len() as u64) < target_len && !self.scan_finished {
            match self.probe_next()? {
                ScanOutcome::Record(header) => {
                    let offset = self.scan_offset;
                    let total = header.total_size();
                    self.cache.push(CacheEntry { offset, header });
                    self.scan_offset += total;
                }
                ScanOutcome::Sentinel => {
                    self.scan_finished = true;
                    self.scan_offset += record::HEADER_SIZE;
                }
                ScanOutcome::Incomplete => break,
            }
        }
        Ok(())
    }

    /// Reads the 16-byte header at `self.scan_offset` and, for a non-sentinel
    /// record, probes whether its final byte has actually landed on disk --
    /// this distinguishes "record physically incomplete" (still being
    /// written) from "record present and parseable".
    fn probe_next(&mut self) -> Result<ScanOutcome> {
        let offset = self.scan_offset;
        let header_bytes = self.read_bytes_blocking(offset, u64_to_usize(record::HEADER_SIZE))?;

        if header_bytes.len() < u64_to_usize(record::HEADER_SIZE) {
            return Ok(ScanOutcome::Incomplete);
        }

        let mut cursor = header_bytes.as_slice();
        let header = RecordHeader::read(&mut cursor)?;

        if header.is_sentinel() {
            return Ok(ScanOutcome::Sentinel);
        }

        let total_len = header.total_size();
        if total_len == record::HEADER_SIZE {
            return Ok(ScanOutcome::Record(header));
        }

        let probe = self.read_bytes_blocking(offset + total_len - 1, 1)?;
        if probe.is_empty() {
            return Ok(ScanOutcome::Incomplete);
        }

        Ok(ScanOutcome::Record(header))
    }

    fn read_header_at(&mut self, offset: u64) -> Result<RecordHeader> {
        let bytes = self.read_bytes_blocking(offset, u64_to_usize(record::HEADER_SIZE))?;
        if bytes.len() < u64_to_usize(record::HEADER_SIZE) {
            return Err(Error::malformed("frame offset from the footer points at a truncated record"));
        }
        let mut cursor = bytes.as_slice();
        RecordHeader::read(&mut cursor)
    }

    fn submit_payload_read(&mut self, offset: u64, header: &RecordHeader) -> Result<()> {
        let start = offset + record::HEADER_SIZE;
        let len = u64_to_usize(header.data_size as u64 + header.extra_size as u64);

        let job: Job<File, Vec<u8>> = Box::new(move |file: &mut File| {
            file.seek(SeekFrom::Start(start))?;
            let mut buffer = vec![0u8; len];
            file.read_exact(&mut buffer)?;
            Ok(buffer)
        });

        self.submit(job)
    }

    /// Blocking read of exactly `len` bytes at `offset`, tolerant of the data
    /// not being fully flushed yet (used only by the header-scan probe,
    /// where a short read means "not there yet", not an error).
    fn read_bytes_blocking(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let job: Job<File, Vec<u8>> = Box::new(move |file: &mut File| {
            file.seek(SeekFrom::Start(offset))?;
            let mut buffer = vec![0u8; len];
            let mut read_so_far = 0;

            loop {
                match file.read(&mut buffer[read_so_far..]) {
                    Ok(0) => break,
                    Ok(n) => {
                        read_so_far += n;
                        if read_so_far == buffer.len() {
                            break;
                        }
                    }
                    Err(ref error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(error) => return Err(error.into()),
                }
            }

            buffer.truncate(read_so_far);
            Ok(buffer)
        });

        self.submit(job)?;
        self.wait_bytes()
    }

    fn submit(&mut self, job: Job<File, Vec<u8>>) -> Result<()> {
        self.scheduled_index = None;
        self.scheduled_header = None;
        self.worker.submit(job).map_err(|error| self.fail(error))
    }

    fn wait_bytes(&mut self) -> Result<Vec<u8>> {
        self.worker.wait().map_err(|error| self.fail(error))
    }

    fn wait_discard(&mut self) -> Result<()> {
        self.wait_bytes().map(|_| ())
    }

    /// Worker-thread failures always close the handle: the first caller to
    /// observe one marks the reader closed so every subsequent call
    /// re-raises immediately instead of touching the worker.
    fn fail(&mut self, error: Error) -> Error {
        self.opened = false;
        error
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::container::writer::Writer;

    fn tempdir() -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("vidpak-reader-test-{}-{}", std::process::id(), rand_suffix()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn rand_suffix() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().subsec_nanos() as u64
    }

    fn synthetic_frame(width: u32, height: u32, bpp: u32, seed: u32) -> Vec<u16> {
        let max = (1u32 << bpp) - 1;
        (0..width * height).map(|i| ((i.wrapping_mul(seed).wrapping_add(seed)) % (max + 1)) as u16).collect()
    }

    fn write_fixture(path: &Path, frame_count: u32) -> Vec<Vec<u16>> {
        let mut writer = Writer::create(path, 32, 32, 12, 16, 16, b"fixture".to_vec()).unwrap();
        let mut frames = Vec::new();
        for i in 0..frame_count {
            let frame = synthetic_frame(32, 32, 12, i + 1);
            writer.write_frame(i as u64 * 1000, &frame, &[i as u8]).unwrap();
            frames.push(frame);
        }
        writer.close(true).unwrap();
        frames
    }

    #[test]
    fn read_frames_in_order_with_prefetch() {
        let dir = tempdir();
        let path = dir.join("s5.vidpak");
        let frames = write_fixture(&path, 10);

        let mut reader = Reader::open(&path).unwrap();
        assert_eq!(reader.count_frames(None).unwrap(), Some(10));

        for (i, expected) in frames.iter().enumerate() {
            let (timestamp, frame, extra) = reader.read_frame(i as u64, None, true).unwrap();
            assert_eq!(timestamp, i as u64 * 1000);
            assert_eq!(&frame, expected);
            assert_eq!(extra, vec![i as u8]);
        }

        let (timestamp, frame, _) = reader.read_frame(0, None, false).unwrap();
        assert_eq!(timestamp, 0);
        assert_eq!(&frame, &frames[0]);

        let (timestamp, frame, _) = reader.read_frame(9, None, false).unwrap();
        assert_eq!(timestamp, 9000);
        assert_eq!(&frame, &frames[9]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn out_of_range_index_is_frame_not_present() {
        let dir = tempdir();
        let path = dir.join("range.vidpak");
        write_fixture(&path, 3);

        let mut reader = Reader::open(&path).unwrap();
        match reader.read_frame(5, None, false) {
            Err(Error::FrameNotPresent { requested, frame_count }) => {
                assert_eq!(requested, 5);
                assert_eq!(frame_count, Some(3));
            }
            other => panic!("expected FrameNotPresent, got {:?}", other.map(|_| ())),
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn footer_fallback_after_truncation_still_scans() {
        let dir = tempdir();
        let path = dir.join("truncated.vidpak");
        let frames = write_fixture(&path, 6);

        let full_len = std::fs::metadata(&path).unwrap().len();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate((full_len - 20) as usize);
        std::fs::write(&path, &bytes).unwrap();

        let mut reader = Reader::open(&path).unwrap();
        assert!(reader.is_endless(), "a footer-less file must fall back to scan mode");

        let mut recovered = 0;
        for i in 0..frames.len() as u64 {
            match reader.read_frame(i, None, false) {
                Ok((_, frame, _)) => {
                    assert_eq!(&frame, &frames[i as usize]);
                    recovered += 1;
                }
                Err(Error::FrameNotPresent { .. }) => break,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        assert!(recovered >= 1, "at least the physically intact frames must still be readable");
        std::fs::remove_file(&path).ok();
    }

    /// A footer written with `write_frame_pos=false` (spec.md §4.4 allows
    /// this) carries a frame count but no offset table. The reader must
    /// still be able to locate and read every frame by falling back to a
    /// header scan, rather than treating the known count as a substitute
    /// for having actually found each record.
    #[test]
    fn footer_without_offset_table_still_locates_every_frame() {
        let dir = tempdir();
        let path = dir.join("footer_no_offsets.vidpak");

        let mut writer = Writer::create(&path, 32, 32, 12, 16, 16, b"fixture".to_vec()).unwrap();
        let mut frames = Vec::new();
        for i in 0..5u32 {
            let frame = synthetic_frame(32, 32, 12, i + 1);
            writer.write_frame(i as u64 * 1000, &frame, &[i as u8]).unwrap();
            frames.push(frame);
        }
        writer.close(false).unwrap();

        let mut reader = Reader::open(&path).unwrap();
        assert!(!reader.is_endless(), "a recovered footer means the stream is known to be closed");
        assert_eq!(reader.count_frames(None).unwrap(), Some(5));

        for (i, expected) in frames.iter().enumerate() {
            let (timestamp, frame, extra) = reader.read_frame(i as u64, None, false).unwrap();
            assert_eq!(timestamp, i as u64 * 1000);
            assert_eq!(&frame, expected);
            assert_eq!(extra, vec![i as u8]);
        }

        match reader.read_frame(5, None, false) {
            Err(Error::FrameNotPresent { requested, frame_count }) => {
                assert_eq!(requested, 5);
                assert_eq!(frame_count, Some(5));
            }
            other => panic!("expected FrameNotPresent, got {:?}", other.map(|_| ())),
        }

        std::fs::remove_file(&path).ok();
    }
}
