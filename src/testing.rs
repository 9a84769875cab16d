//! Test doubles for the host platform and the eDMA hardware.
//!
//! [`MockPlatform`] implements every collaborator trait in memory. Clones
//! share state, so several engines built on clones of one platform behave
//! like several processes on one machine: they see the same registry, the
//! same shared memory and the same register blocks.
//!
//! [`MockRegisters`] emulates enough of the eDMA and DMAMUX register
//! semantics for the engine's sequences: clear/set-by-index registers,
//! write-1-to-clear flags, DONE/DREQ handling at the end of a major loop and
//! scatter-gather loads from descriptor memory.

extern crate std;

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::boxed::Box;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::string::{String, ToString};
use std::sync::{Arc, Mutex};
use std::vec;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::driver::config::{ControllerDesc, EngineConfig, MuxDesc};
use crate::driver::engine::Engine;
use crate::driver::error::{ResourceError, Result};
use crate::hal::{
    DmaRegion, InterruptAttach, IrqHandle, PhysMapper, Platform, RegisterIo, ResourceHandle,
    ResourceRegistry, SharedMemory, SharedRegion,
};
use crate::internal::dma::descriptor::TcdImage;
use crate::internal::dma::descriptor::bits::{attr, csr, iter};
use crate::internal::register::edma::{
    self, CDNE_OFFSET, CEEI_OFFSET, CERQ_OFFSET, CERR_OFFSET, CINT_OFFSET, CR_OFFSET, EEI_OFFSET,
    ERQ_OFFSET, ERR_OFFSET, ES_OFFSET, ES_ERRCHN_SHIFT, ES_VLD, INDEX_ALL, INDEX_MASK, INT_OFFSET,
    SEEI_OFFSET, SERQ_OFFSET, SSRT_OFFSET, TCD_BASE, TCD_STRIDE, tcd, tcd_offset,
};

// =============================================================================
// Test Topology
// =============================================================================

/// Muxes of test controller 0: slots 0..32 feed channels 0..8, 32..64 feed 8..16
pub static TEST_MUX0: [MuxDesc; 2] = [
    MuxDesc {
        base: 0x4002_4000,
        slots: 32,
        first_channel: 0,
        channels: 8,
    },
    MuxDesc {
        base: 0x4002_5000,
        slots: 32,
        first_channel: 8,
        channels: 8,
    },
];

/// Mux of test controller 1: slots 64..80 feed channels 0..4
pub static TEST_MUX1: [MuxDesc; 1] = [MuxDesc {
    base: 0x400A_1000,
    slots: 16,
    first_channel: 0,
    channels: 4,
}];

/// Two controllers, 20 channels, 80 slots
pub static TEST_CONTROLLERS: [ControllerDesc; 2] = [
    ControllerDesc {
        base: 0x4001_8000,
        channels: 16,
        channel_base: 0,
        completion_irqs: &[40],
        error_irq: 41,
        muxes: &TEST_MUX0,
    },
    ControllerDesc {
        base: 0x4009_8000,
        channels: 4,
        channel_base: 16,
        completion_irqs: &[42, 44],
        error_irq: 43,
        muxes: &TEST_MUX1,
    },
];

/// A peripheral data register: not backed by memory
pub const TEST_FIFO: u32 = 0x4003_8000;

/// Engine configuration over [`TEST_CONTROLLERS`]
pub fn test_config() -> EngineConfig {
    EngineConfig::new()
        .with_controllers(&TEST_CONTROLLERS)
        .with_shared_name("/ph-edma-test")
        .with_descriptors(8)
        .with_halt_timeout_us(100)
        .with_lock_timeout_us(1_000)
}

// =============================================================================
// Delay
// =============================================================================

/// Delay that only accounts time.
#[derive(Debug, Default)]
pub struct MockDelay {
    elapsed_ns: u64,
}

impl MockDelay {
    /// A delay with no time elapsed
    pub fn new() -> Self {
        Self::default()
    }

    /// Total delay requested so far
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ns / 1_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
        std::thread::yield_now();
    }
}

// =============================================================================
// DMA Memory
// =============================================================================

struct Block {
    raw: *mut [u64],
    offset: usize,
    len: usize,
}

impl Block {
    fn zeroed(len: usize) -> Self {
        let words = vec![0u64; len.div_ceil(8).max(1)].into_boxed_slice();
        Self {
            raw: Box::into_raw(words),
            offset: 0,
            len,
        }
    }

    /// Block whose start is congruent to `phys` modulo the TCD alignment
    fn congruent(len: usize, phys: u64) -> Self {
        let mut block = Self::zeroed(len + TCD_STRIDE);
        let align = TCD_STRIDE as u64;
        let start = block.raw.cast::<u8>() as u64;
        block.offset = ((phys % align + align - start % align) % align) as usize;
        block.len = len;
        block
    }

    fn base(&self) -> *mut u8 {
        // SAFETY: offset stays inside the allocation
        unsafe { self.raw.cast::<u8>().add(self.offset) }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: raw came from Box::into_raw in `zeroed`
        drop(unsafe { Box::from_raw(self.raw) });
    }
}

// SAFETY: a block is plain heap memory owned by the map holding it
unsafe impl Send for Block {}

/// Fake physical address space
struct MemoryMap {
    next_phys: u64,
    blocks: BTreeMap<u64, Block>,
}

impl MemoryMap {
    fn new(base: u64) -> Self {
        Self {
            next_phys: base,
            blocks: BTreeMap::new(),
        }
    }

    fn alloc(&mut self, len: usize) -> (NonNull<u8>, u64) {
        let phys = self.next_phys;
        let block = Block::congruent(len, phys);
        // Keep every block 16 bytes off a TCD boundary
        self.next_phys = (phys + len as u64).next_multiple_of(32) + 0x30;
        let virt = NonNull::new(block.base()).unwrap();
        self.blocks.insert(phys, block);
        (virt, phys)
    }

    fn free(&mut self, phys: u64) {
        self.blocks.remove(&phys);
    }

    fn translate(&self, phys: u64, len: usize) -> Option<*mut u8> {
        let (&start, block) = self.blocks.range(..=phys).next_back()?;
        let offset = (phys - start) as usize;
        // SAFETY: offset + len is inside the block
        (offset + len <= block.len).then(|| unsafe { block.base().add(offset) })
    }
}

// =============================================================================
// Register Emulation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Edma { channels: usize },
    Mux,
}

/// Emulated eDMA or DMAMUX register block.
pub struct MockRegisters {
    kind: BlockKind,
    file: Mutex<Vec<u8>>,
    mem: Arc<Mutex<MemoryMap>>,
}

fn get(file: &[u8], offset: usize, width: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes[..width].copy_from_slice(&file[offset..offset + width]);
    u32::from_le_bytes(bytes)
}

fn put(file: &mut [u8], offset: usize, width: usize, value: u32) {
    file[offset..offset + width].copy_from_slice(&value.to_le_bytes()[..width]);
}

fn parse_tcd(bytes: &[u8]) -> TcdImage {
    TcdImage {
        saddr: get(bytes, tcd::SADDR, 4),
        soff: get(bytes, tcd::SOFF, 2) as u16 as i16,
        attr: get(bytes, tcd::ATTR, 2) as u16,
        nbytes: get(bytes, tcd::NBYTES, 4),
        slast: get(bytes, tcd::SLAST, 4) as i32,
        daddr: get(bytes, tcd::DADDR, 4),
        doff: get(bytes, tcd::DOFF, 2) as u16 as i16,
        citer: get(bytes, tcd::CITER, 2) as u16,
        dlast_sga: get(bytes, tcd::DLAST_SGA, 4) as i32,
        csr: get(bytes, tcd::CSR, 2) as u16,
        biter: get(bytes, tcd::BITER, 2) as u16,
    }
}

fn emit_tcd(bytes: &mut [u8], image: &TcdImage) {
    put(bytes, tcd::SADDR, 4, image.saddr);
    put(bytes, tcd::SOFF, 2, image.soff as u16 as u32);
    put(bytes, tcd::ATTR, 2, u32::from(image.attr));
    put(bytes, tcd::NBYTES, 4, image.nbytes);
    put(bytes, tcd::SLAST, 4, image.slast as u32);
    put(bytes, tcd::DADDR, 4, image.daddr);
    put(bytes, tcd::DOFF, 2, image.doff as u16 as u32);
    put(bytes, tcd::CITER, 2, u32::from(image.citer));
    put(bytes, tcd::DLAST_SGA, 4, image.dlast_sga as u32);
    put(bytes, tcd::CSR, 2, u32::from(image.csr));
    put(bytes, tcd::BITER, 2, u32::from(image.biter));
}

impl MockRegisters {
    fn new(kind: BlockKind, len: usize, mem: Arc<Mutex<MemoryMap>>) -> Self {
        Self {
            kind,
            file: Mutex::new(vec![0; len]),
            mem,
        }
    }

    /// Standalone eDMA block with `channels` channels and no memory behind it
    pub fn edma(channels: usize) -> Arc<Self> {
        Arc::new(Self::new(
            BlockKind::Edma { channels },
            edma::window_len(channels),
            Arc::new(Mutex::new(MemoryMap::new(0))),
        ))
    }

    fn channel_mask(&self, index: u8) -> u32 {
        let BlockKind::Edma { channels } = self.kind else {
            return 0;
        };
        if index & INDEX_ALL != 0 {
            if channels >= 32 { u32::MAX } else { (1u32 << channels) - 1 }
        } else {
            1 << (index & INDEX_MASK)
        }
    }

    fn update_bits(file: &mut [u8], offset: usize, mask: u32, set: bool) {
        let current = get(file, offset, 4);
        put(file, offset, 4, if set { current | mask } else { current & !mask });
    }

    fn update_csr(file: &mut [u8], mask: u32, f: impl Fn(u16) -> u16) {
        for channel in 0..32u8 {
            if mask & (1 << channel) != 0 {
                let offset = tcd_offset(channel) + tcd::CSR;
                if offset + 2 <= file.len() {
                    let value = f(get(file, offset, 2) as u16);
                    put(file, offset, 2, u32::from(value));
                }
            }
        }
    }

    fn is_csr(offset: usize) -> bool {
        offset >= TCD_BASE && (offset - TCD_BASE) % TCD_STRIDE == tcd::CSR
    }

    // =========================================================================
    // Hardware Behaviour
    // =========================================================================

    /// Run channel `ch`'s loaded descriptor to the end of its major loop.
    ///
    /// Moves the data between memory-backed addresses, sets DONE, raises the
    /// interrupt if INTMAJOR, drops the request enable if DREQ, applies the
    /// last-address adjustments and, with ESG, loads the next descriptor from
    /// memory.
    pub fn complete_major_loop(&self, ch: u8) {
        let mut file = self.file.lock().unwrap();
        let base = tcd_offset(ch);
        let live = parse_tcd(&file[base..base + TCD_STRIDE]);

        let unit = attr::size_bytes((live.attr & attr::SSIZE_MASK) >> attr::SSIZE_SHIFT);
        let accesses = (live.nbytes / unit) * u32::from(live.citer & iter::COUNT_MASK);
        let (mut src, mut dst) = (live.saddr, live.daddr);
        let next = {
            let mem = self.mem.lock().unwrap();
            for _ in 0..accesses {
                let from = mem.translate(u64::from(src), unit as usize);
                let to = mem.translate(u64::from(dst), unit as usize);
                if let (Some(from), Some(to)) = (from, to) {
                    // SAFETY: both ranges were translated inside live blocks
                    unsafe { core::ptr::copy(from, to, unit as usize) };
                }
                src = src.wrapping_add_signed(i32::from(live.soff));
                dst = dst.wrapping_add_signed(i32::from(live.doff));
            }
            (live.csr & csr::ESG != 0)
                .then(|| mem.translate(u64::from(live.dlast_sga as u32), TCD_STRIDE))
                .flatten()
                // SAFETY: the descriptor range was translated inside a live block
                .map(|ptr| parse_tcd(unsafe { core::slice::from_raw_parts(ptr, TCD_STRIDE) }))
        };

        let finished = TcdImage {
            saddr: src.wrapping_add_signed(live.slast),
            daddr: if live.csr & csr::ESG != 0 {
                dst
            } else {
                dst.wrapping_add_signed(live.dlast_sga)
            },
            citer: live.biter,
            csr: (live.csr & !(csr::START | csr::ACTIVE)) | csr::DONE,
            ..live
        };
        emit_tcd(&mut file[base..base + TCD_STRIDE], &finished);

        let bit = 1u32 << ch;
        if live.csr & csr::INTMAJOR != 0 {
            Self::update_bits(&mut file, INT_OFFSET, bit, true);
        }
        if live.csr & csr::DREQ != 0 {
            Self::update_bits(&mut file, ERQ_OFFSET, bit, false);
        }
        if let Some(next) = next {
            emit_tcd(&mut file[base..base + TCD_STRIDE], &next);
        }
    }

    /// Advance channel `ch` by `loops` device-paced minor loops without
    /// moving data.
    ///
    /// # Panics
    ///
    /// When `loops` is not below the live CITER; finishing the major loop
    /// is [`complete_major_loop`](Self::complete_major_loop)'s job.
    pub fn advance_minor_loops(&self, ch: u8, loops: u16) {
        let base = tcd_offset(ch);
        let mut live = parse_tcd(&self.file.lock().unwrap()[base..base + TCD_STRIDE]);
        assert!(
            loops < live.citer,
            "{loops} minor loops requested but only {} remain",
            live.citer
        );
        let mut file = self.file.lock().unwrap();
        let unit = attr::size_bytes((live.attr & attr::SSIZE_MASK) >> attr::SSIZE_SHIFT);
        let per_loop = (live.nbytes / unit) as i32;
        for _ in 0..loops {
            live.saddr = live.saddr.wrapping_add_signed(i32::from(live.soff) * per_loop);
            live.daddr = live.daddr.wrapping_add_signed(i32::from(live.doff) * per_loop);
            live.citer -= 1;
        }
        emit_tcd(&mut file[base..base + TCD_STRIDE], &live);
    }

    /// Latch a completion interrupt for `ch`
    pub fn raise_interrupt(&self, ch: u8) {
        let mut file = self.file.lock().unwrap();
        Self::update_bits(&mut file, INT_OFFSET, 1 << ch, true);
    }

    /// Latch an error on `ch` with the given ES cause bits
    pub fn raise_error(&self, ch: u8, cause: u32) {
        let mut file = self.file.lock().unwrap();
        Self::update_bits(&mut file, ERR_OFFSET, 1 << ch, true);
        put(&mut file, ES_OFFSET, 4, ES_VLD | cause | (u32::from(ch) << ES_ERRCHN_SHIFT));
    }

    /// Force CSR.ACTIVE on or off
    pub fn set_active(&self, ch: u8, active: bool) {
        let mut file = self.file.lock().unwrap();
        Self::update_csr(&mut file, 1 << ch, |v| {
            if active { v | csr::ACTIVE } else { v & !csr::ACTIVE }
        });
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    fn read(&self, offset: usize, width: usize) -> u32 {
        get(&self.file.lock().unwrap(), offset, width)
    }

    /// Control register
    pub fn cr(&self) -> u32 {
        self.read(CR_OFFSET, 4)
    }

    /// Request-enable bitmap
    pub fn erq(&self) -> u32 {
        self.read(ERQ_OFFSET, 4)
    }

    /// Error-interrupt-enable bitmap
    pub fn eei(&self) -> u32 {
        self.read(EEI_OFFSET, 4)
    }

    /// Pending-interrupt bitmap
    pub fn int(&self) -> u32 {
        self.read(INT_OFFSET, 4)
    }

    /// Error bitmap
    pub fn err(&self) -> u32 {
        self.read(ERR_OFFSET, 4)
    }

    /// Channel arbitration priority
    pub fn priority(&self, ch: u8) -> u8 {
        self.read(edma::dchpri_offset(ch), 1) as u8 & edma::DCHPRI_CHPRI_MASK
    }

    /// Live descriptor of `ch`
    pub fn tcd(&self, ch: u8) -> TcdImage {
        let file = self.file.lock().unwrap();
        let base = tcd_offset(ch);
        parse_tcd(&file[base..base + TCD_STRIDE])
    }

    /// DMAMUX channel configuration byte
    pub fn chcfg(&self, ch: u8) -> u8 {
        self.read(ch as usize, 1) as u8
    }
}

impl RegisterIo for MockRegisters {
    fn read32(&self, offset: usize) -> u32 {
        self.read(offset, 4)
    }

    fn write32(&self, offset: usize, value: u32) {
        let mut file = self.file.lock().unwrap();
        match (self.kind, offset) {
            (BlockKind::Edma { .. }, INT_OFFSET | ERR_OFFSET) => {
                Self::update_bits(&mut file, offset, value, false);
            }
            (BlockKind::Edma { .. }, ES_OFFSET) => {}
            _ => put(&mut file, offset, 4, value),
        }
    }

    fn read16(&self, offset: usize) -> u16 {
        self.read(offset, 2) as u16
    }

    fn write16(&self, offset: usize, value: u16) {
        let mut file = self.file.lock().unwrap();
        if matches!(self.kind, BlockKind::Edma { .. }) && Self::is_csr(offset) {
            let old = get(&file, offset, 2) as u16;
            let mut new = (value & !csr::STATUS) | (old & csr::STATUS);
            // The hardware refuses to arm ESG on a finished descriptor
            if old & csr::DONE != 0 {
                new &= !csr::ESG;
            }
            put(&mut file, offset, 2, u32::from(new));
        } else {
            put(&mut file, offset, 2, u32::from(value));
        }
    }

    fn read8(&self, offset: usize) -> u8 {
        self.read(offset, 1) as u8
    }

    fn write8(&self, offset: usize, value: u8) {
        let mut file = self.file.lock().unwrap();
        if self.kind == BlockKind::Mux {
            put(&mut file, offset, 1, u32::from(value));
            return;
        }
        let mask = self.channel_mask(value);
        match offset {
            CEEI_OFFSET => Self::update_bits(&mut file, EEI_OFFSET, mask, false),
            SEEI_OFFSET => Self::update_bits(&mut file, EEI_OFFSET, mask, true),
            CERQ_OFFSET => Self::update_bits(&mut file, ERQ_OFFSET, mask, false),
            SERQ_OFFSET => Self::update_bits(&mut file, ERQ_OFFSET, mask, true),
            CERR_OFFSET => Self::update_bits(&mut file, ERR_OFFSET, mask, false),
            CINT_OFFSET => Self::update_bits(&mut file, INT_OFFSET, mask, false),
            CDNE_OFFSET => Self::update_csr(&mut file, mask, |v| v & !csr::DONE),
            SSRT_OFFSET => Self::update_csr(&mut file, mask, |v| v | csr::START),
            _ => put(&mut file, offset, 1, u32::from(value)),
        }
    }
}

/// Window handed out by [`MockPlatform::map_window`]
#[derive(Clone)]
pub struct MockWindow(Arc<MockRegisters>);

impl RegisterIo for MockWindow {
    fn read32(&self, offset: usize) -> u32 {
        self.0.read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.0.write32(offset, value);
    }

    fn read16(&self, offset: usize) -> u16 {
        self.0.read16(offset)
    }

    fn write16(&self, offset: usize, value: u16) {
        self.0.write16(offset, value);
    }

    fn read8(&self, offset: usize) -> u8 {
        self.0.read8(offset)
    }

    fn write8(&self, offset: usize, value: u8) {
        self.0.write8(offset, value);
    }
}

// =============================================================================
// Platform
// =============================================================================

struct SharedObject {
    block: Block,
}

#[derive(Default)]
struct Faults {
    dma_alloc: AtomicBool,
    shared_memory: AtomicBool,
    map: Mutex<Option<u64>>,
    irq: Mutex<Option<u32>>,
}

struct Inner {
    mem: Arc<Mutex<MemoryMap>>,
    windows: Mutex<HashMap<u64, Arc<MockRegisters>>>,
    live_windows: AtomicUsize,
    reserved: Mutex<BTreeSet<u32>>,
    irqs: Mutex<Vec<u32>>,
    shared: Mutex<HashMap<String, SharedObject>>,
    faults: Faults,
}

/// In-memory host platform. Clones share all state.
#[derive(Clone)]
pub struct MockPlatform {
    inner: Arc<Inner>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Platform whose DMA memory starts at a 32-bit address
    pub fn new() -> Self {
        Self::with_phys_base(0x2000_0010)
    }

    /// Platform whose DMA memory starts at `base`
    pub fn with_phys_base(base: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                mem: Arc::new(Mutex::new(MemoryMap::new(base))),
                windows: Mutex::new(HashMap::new()),
                live_windows: AtomicUsize::new(0),
                reserved: Mutex::new(BTreeSet::new()),
                irqs: Mutex::new(Vec::new()),
                shared: Mutex::new(HashMap::new()),
                faults: Faults::default(),
            }),
        }
    }

    /// DMA regions currently allocated
    pub fn live_dma_regions(&self) -> usize {
        self.inner.mem.lock().unwrap().blocks.len()
    }

    /// Register windows currently mapped
    pub fn live_windows(&self) -> usize {
        self.inner.live_windows.load(Ordering::SeqCst)
    }

    /// Channel numbers currently reserved in the registry
    pub fn reserved_channels(&self) -> usize {
        self.inner.reserved.lock().unwrap().len()
    }

    /// Interrupt lines currently attached
    pub fn attached_irqs(&self) -> Vec<u32> {
        self.inner.irqs.lock().unwrap().clone()
    }

    /// Make DMA allocation fail
    pub fn fail_dma_alloc(&self, fail: bool) {
        self.inner.faults.dma_alloc.store(fail, Ordering::SeqCst);
    }

    /// Make shared memory unavailable
    pub fn fail_shared_memory(&self, fail: bool) {
        self.inner.faults.shared_memory.store(fail, Ordering::SeqCst);
    }

    /// Make mapping the window at `base` fail
    pub fn fail_map_at(&self, base: Option<u64>) {
        *self.inner.faults.map.lock().unwrap() = base;
    }

    /// Make attaching interrupt line `irq` fail
    pub fn fail_irq(&self, irq: Option<u32>) {
        *self.inner.faults.irq.lock().unwrap() = irq;
    }

    /// Create a zeroed shared object nobody has initialized
    pub fn precreate_shared(&self, name: &str, len: usize) {
        self.inner.shared.lock().unwrap().insert(
            name.to_string(),
            SharedObject {
                block: Block::zeroed(len),
            },
        );
    }

    /// Register block mapped at `base`
    pub fn registers(&self, base: u64) -> Arc<MockRegisters> {
        Arc::clone(&self.inner.windows.lock().unwrap()[&base])
    }

    /// Fill a DMA region byte by byte
    pub fn fill(&self, region: &DmaRegion, f: impl Fn(usize) -> u8) {
        let ptr = region.virt().as_ptr();
        for i in 0..region.len() {
            // SAFETY: i is inside the region
            unsafe { ptr.add(i).write_volatile(f(i)) };
        }
    }

    /// Copy of a DMA region's contents
    pub fn bytes(&self, region: &DmaRegion) -> Vec<u8> {
        let ptr = region.virt().as_ptr();
        // SAFETY: i is inside the region
        (0..region.len()).map(|i| unsafe { ptr.add(i).read_volatile() }).collect()
    }
}

impl PhysMapper for MockPlatform {
    type Window = MockWindow;

    fn map_window(&self, phys: u64, len: usize) -> Result<MockWindow> {
        if *self.inner.faults.map.lock().unwrap() == Some(phys) {
            return Err(ResourceError::MapFailed.into());
        }
        let mut windows = self.inner.windows.lock().unwrap();
        let registers = windows.entry(phys).or_insert_with(|| {
            let kind = if len > TCD_BASE {
                BlockKind::Edma {
                    channels: (len - TCD_BASE) / TCD_STRIDE,
                }
            } else {
                BlockKind::Mux
            };
            Arc::new(MockRegisters::new(kind, len, Arc::clone(&self.inner.mem)))
        });
        self.inner.live_windows.fetch_add(1, Ordering::SeqCst);
        Ok(MockWindow(Arc::clone(registers)))
    }

    fn unmap_window(&self, _window: MockWindow) {
        self.inner.live_windows.fetch_sub(1, Ordering::SeqCst);
    }

    fn alloc_dma(&self, len: usize) -> Result<DmaRegion> {
        if self.inner.faults.dma_alloc.load(Ordering::SeqCst) {
            return Err(ResourceError::AllocFailed.into());
        }
        let (virt, phys) = self.inner.mem.lock().unwrap().alloc(len);
        // SAFETY: the block is zeroed, `len` bytes long and lives until freed
        Ok(unsafe { DmaRegion::new(virt, phys, len) })
    }

    fn free_dma(&self, region: DmaRegion) {
        self.inner.mem.lock().unwrap().free(region.phys());
    }
}

impl ResourceRegistry for MockPlatform {
    fn reserve(&self, range: core::ops::Range<u32>, count: u32) -> Result<ResourceHandle> {
        let mut reserved = self.inner.reserved.lock().unwrap();
        let mut start = range.start;
        while start + count <= range.end {
            if (start..start + count).all(|n| !reserved.contains(&n)) {
                reserved.extend(start..start + count);
                return Ok(ResourceHandle { start, count });
            }
            start += 1;
        }
        Err(ResourceError::NoFreeChannel.into())
    }

    fn release(&self, handle: ResourceHandle) {
        let mut reserved = self.inner.reserved.lock().unwrap();
        for n in handle.start..handle.start + handle.count {
            reserved.remove(&n);
        }
    }
}

impl InterruptAttach for MockPlatform {
    fn attach(&self, irq: u32) -> Result<IrqHandle> {
        if *self.inner.faults.irq.lock().unwrap() == Some(irq) {
            return Err(ResourceError::IrqAttachFailed.into());
        }
        self.inner.irqs.lock().unwrap().push(irq);
        Ok(IrqHandle(irq))
    }

    fn detach(&self, handle: IrqHandle) {
        let mut irqs = self.inner.irqs.lock().unwrap();
        if let Some(pos) = irqs.iter().position(|&irq| irq == handle.0) {
            irqs.remove(pos);
        }
    }
}

impl SharedMemory for MockPlatform {
    fn open_or_create(&self, name: &str, len: usize) -> Result<SharedRegion> {
        if self.inner.faults.shared_memory.load(Ordering::SeqCst) {
            return Err(ResourceError::SharedMemoryFailed.into());
        }
        let mut shared = self.inner.shared.lock().unwrap();
        let created = !shared.contains_key(name);
        let object = shared.entry(name.to_string()).or_insert_with(|| SharedObject {
            block: Block::zeroed(len),
        });
        let ptr = NonNull::new(object.block.base()).unwrap();
        // SAFETY: the block is 8-byte aligned, zero-filled on creation and
        // lives as long as the platform
        Ok(unsafe { SharedRegion::new(ptr, object.block.len, created) })
    }

    fn close(&self, _region: SharedRegion) {}
}

impl Platform for MockPlatform {
    type Event = u32;
    type Delay = MockDelay;

    fn delay(&self) -> MockDelay {
        MockDelay::new()
    }
}

// =============================================================================
// Rig
// =============================================================================

/// A platform together with an engine over [`TEST_CONTROLLERS`]
pub struct Rig {
    /// Shared platform state
    pub platform: MockPlatform,
    /// Engine under test
    pub engine: Engine<MockPlatform>,
}

impl Rig {
    /// Engine built from [`test_config`]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Engine built from `config`
    pub fn with_config(config: EngineConfig) -> Self {
        let platform = MockPlatform::new();
        let engine = Engine::new(platform.clone(), config).unwrap();
        Self { platform, engine }
    }

    /// Registers of test controller 0
    pub fn edma0(&self) -> Arc<MockRegisters> {
        self.platform.registers(TEST_CONTROLLERS[0].base)
    }

    /// Registers of test controller 1
    pub fn edma1(&self) -> Arc<MockRegisters> {
        self.platform.registers(TEST_CONTROLLERS[1].base)
    }

    /// Registers of the mux at `base`
    pub fn mux(&self, base: u64) -> Arc<MockRegisters> {
        self.platform.registers(base)
    }
}
