//! Single-file paged node store.
//!
//! The on-disk reference implementation of [`NodeStore`]: one file of
//! fixed-size pages, one node per page, CRC32-checksummed.
//!
//! # File Layout
//! Pages are laid out sequentially; page N sits at offset `N × PAGE_SIZE`
//! and the root node always occupies page 0:
//! ```text
//! ┌─────────┬─────────┬─────────┬─────────┐
//! │ Page 0  │ Page 1  │ Page 2  │  ...    │
//! │ (root)  │ (4KB)   │ (4KB)   │         │
//! └─────────┴─────────┴─────────┴─────────┘
//! ```
//!
//! # Page Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       1     page type (1 leaf, 2 internal, 3 free)
//! 1       4     CRC32 checksum (LE, computed with this field zeroed)
//! 5       2     key count n (LE)
//! 7       ...   if internal: (n+1) child addresses, u64 LE each
//! ...           n entries: u16 key len, key bytes, u16 value len, value bytes
//! ```
//!
//! Keys and values go through the store's [`KeyValueCodec`]; the store
//! only frames them. A node that does not fit its page is a codec error —
//! there are no overflow pages, so the caller picks the tree order and
//! codec to suit.
//!
//! # Durability
//! Every page write is followed by `sync_all()`. Conservative, and the
//! same posture the rest of the crate assumes: a page write that returns
//! `Ok` is on disk. There is still no multi-page atomicity — the tree's
//! splits and merges touch several pages with no WAL underneath.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::btree::Node;
use crate::common::config::PAGE_SIZE;
use crate::common::{Error, NodeAddress, Result};

use super::codec::KeyValueCodec;
use super::NodeStore;

const TYPE_LEAF: u8 = 1;
const TYPE_INTERNAL: u8 = 2;
const TYPE_FREE: u8 = 3;

const OFFSET_TYPE: usize = 0;
const OFFSET_CHECKSUM: usize = 1;
const OFFSET_KEY_COUNT: usize = 5;
const HEADER_SIZE: usize = 7;

/// The root node's page number.
const ROOT_PAGE: u64 = 0;

/// A [`NodeStore`] backed by a single file of checksummed 4KB pages.
///
/// # Thread Safety
/// All file state sits behind a `Mutex`, so the store is `&self`
/// throughout; the tree's whole-tree latch serializes logical access on
/// top of that.
pub struct PagedNodeStore<C> {
    codec: C,
    inner: Mutex<Inner>,
}

struct Inner {
    file: std::fs::File,
    /// Number of pages in the file.
    page_count: u64,
    /// Reclaimed page numbers, handed out again before the file grows.
    free_list: Vec<u64>,
}

impl<C: KeyValueCodec> PagedNodeStore<C> {
    /// Create a new store file.
    ///
    /// # Errors
    /// Fails if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, codec: C) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            codec,
            inner: Mutex::new(Inner {
                file,
                page_count: 0,
                free_list: Vec::new(),
            }),
        })
    }

    /// Open an existing store file.
    ///
    /// Scans the file once to rebuild the free list (freed pages are
    /// marked in place rather than tracked in a separate structure).
    ///
    /// # Errors
    /// Fails if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, codec: C) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let page_count = file.metadata()?.len() / PAGE_SIZE as u64;
        let mut free_list = Vec::new();
        let mut page = [0u8; PAGE_SIZE];
        for page_no in 0..page_count {
            file.seek(SeekFrom::Start(page_no * PAGE_SIZE as u64))?;
            file.read_exact(&mut page)?;
            if page[OFFSET_TYPE] == TYPE_FREE {
                free_list.push(page_no);
            }
        }

        Ok(Self {
            codec,
            inner: Mutex::new(Inner {
                file,
                page_count,
                free_list,
            }),
        })
    }

    /// Open an existing store file, or create one if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P, codec: C) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, codec)
        } else {
            Self::create(path, codec)
        }
    }

    // ========================================================================
    // Page encode/decode
    // ========================================================================

    fn encode_node(&self, node: &Node<C::Key, C::Value>) -> Result<[u8; PAGE_SIZE]> {
        let mut page = [0u8; PAGE_SIZE];
        page[OFFSET_TYPE] = if node.is_leaf() { TYPE_LEAF } else { TYPE_INTERNAL };

        let n = node.len();
        if n > u16::MAX as usize {
            return Err(Error::Codec(format!("{} key count exceeds u16", node.address())));
        }
        page[OFFSET_KEY_COUNT..OFFSET_KEY_COUNT + 2]
            .copy_from_slice(&(n as u16).to_le_bytes());

        let mut cursor = HEADER_SIZE;
        for child in node.children() {
            put_bytes(&mut page, &mut cursor, &child.0.to_le_bytes(), node.address())?;
        }
        let mut scratch = Vec::new();
        for i in 0..n {
            scratch.clear();
            self.codec.encode_key(node.key(i), &mut scratch);
            put_item(&mut page, &mut cursor, &scratch, node.address())?;
            scratch.clear();
            self.codec.encode_value(node.value(i), &mut scratch);
            put_item(&mut page, &mut cursor, &scratch, node.address())?;
        }

        let checksum = page_checksum(&page);
        page[OFFSET_CHECKSUM..OFFSET_CHECKSUM + 4].copy_from_slice(&checksum.to_le_bytes());
        Ok(page)
    }

    fn decode_node(
        &self,
        address: NodeAddress,
        page: &[u8; PAGE_SIZE],
    ) -> Result<Node<C::Key, C::Value>> {
        // Checksum first: until the page proves intact, its type byte
        // means nothing.
        let stored = u32::from_le_bytes(
            page[OFFSET_CHECKSUM..OFFSET_CHECKSUM + 4]
                .try_into()
                .expect("4-byte slice"),
        );
        if stored != page_checksum(page) {
            return Err(Error::ChecksumMismatch(address));
        }

        let is_leaf = match page[OFFSET_TYPE] {
            TYPE_LEAF => true,
            TYPE_INTERNAL => false,
            // Free (or unknown) but intact: nothing lives here.
            _ => return Err(Error::NodeNotFound(address)),
        };

        let n = u16::from_le_bytes(
            page[OFFSET_KEY_COUNT..OFFSET_KEY_COUNT + 2]
                .try_into()
                .expect("2-byte slice"),
        ) as usize;

        let mut cursor = HEADER_SIZE;
        let mut children = Vec::new();
        if !is_leaf {
            children.reserve(n + 1);
            for _ in 0..=n {
                let bytes = take_bytes(page, &mut cursor, 8, address)?;
                children.push(NodeAddress::new(u64::from_le_bytes(
                    bytes.try_into().expect("8-byte slice"),
                )));
            }
        }

        let mut keys = Vec::with_capacity(n);
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            keys.push(self.codec.decode_key(take_item(page, &mut cursor, address)?)?);
            values.push(self.codec.decode_value(take_item(page, &mut cursor, address)?)?);
        }

        Ok(Node::from_parts(address, keys, values, children))
    }
}

impl<C: KeyValueCodec> NodeStore<C::Key, C::Value> for PagedNodeStore<C> {
    fn root_address(&self) -> Result<NodeAddress> {
        Ok(NodeAddress::new(ROOT_PAGE))
    }

    fn read_node(&self, address: NodeAddress) -> Result<Node<C::Key, C::Value>> {
        let mut inner = self.inner.lock();
        if address.0 >= inner.page_count {
            return Err(Error::NodeNotFound(address));
        }
        let page = read_page(&mut inner, address.0)?;
        drop(inner);
        self.decode_node(address, &page)
    }

    fn write_node(&self, node: &Node<C::Key, C::Value>) -> Result<()> {
        let page = self.encode_node(node)?;
        let mut inner = self.inner.lock();
        write_page(&mut inner, node.address().0, &page)
    }

    fn delete_node(&self, address: NodeAddress) -> Result<()> {
        let mut inner = self.inner.lock();
        if address.0 >= inner.page_count {
            return Err(Error::NodeNotFound(address));
        }
        write_page(&mut inner, address.0, &free_page())?;
        inner.free_list.push(address.0);
        Ok(())
    }

    fn allocate_address(&self) -> Result<NodeAddress> {
        let mut inner = self.inner.lock();
        if let Some(page_no) = inner.free_list.pop() {
            return Ok(NodeAddress::new(page_no));
        }
        // Extend the file with a well-formed free page; the caller's
        // write_node fills it in. Left unclaimed by a crash, the reopen
        // scan reclaims it.
        let page_no = inner.page_count.max(ROOT_PAGE + 1);
        write_page(&mut inner, page_no, &free_page())?;
        Ok(NodeAddress::new(page_no))
    }

    fn flush(&self) -> Result<()> {
        let inner = self.inner.lock();
        inner.file.sync_all()?;
        Ok(())
    }
}

/// A checksummed page holding no node.
fn free_page() -> [u8; PAGE_SIZE] {
    let mut page = [0u8; PAGE_SIZE];
    page[OFFSET_TYPE] = TYPE_FREE;
    let checksum = page_checksum(&page);
    page[OFFSET_CHECKSUM..OFFSET_CHECKSUM + 4].copy_from_slice(&checksum.to_le_bytes());
    page
}

/// CRC32 over the whole page with the checksum field itself zeroed.
fn page_checksum(page: &[u8; PAGE_SIZE]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&page[..OFFSET_CHECKSUM]);
    hasher.update(&[0u8; 4]);
    hasher.update(&page[OFFSET_CHECKSUM + 4..]);
    hasher.finalize()
}

fn read_page(inner: &mut Inner, page_no: u64) -> Result<[u8; PAGE_SIZE]> {
    inner
        .file
        .seek(SeekFrom::Start(page_no * PAGE_SIZE as u64))?;
    let mut page = [0u8; PAGE_SIZE];
    inner.file.read_exact(&mut page)?;
    Ok(page)
}

fn write_page(inner: &mut Inner, page_no: u64, page: &[u8; PAGE_SIZE]) -> Result<()> {
    inner
        .file
        .seek(SeekFrom::Start(page_no * PAGE_SIZE as u64))?;
    inner.file.write_all(page)?;
    inner.file.sync_all()?;
    if page_no >= inner.page_count {
        inner.page_count = page_no + 1;
    }
    Ok(())
}

fn put_bytes(
    page: &mut [u8; PAGE_SIZE],
    cursor: &mut usize,
    bytes: &[u8],
    address: NodeAddress,
) -> Result<()> {
    let end = *cursor + bytes.len();
    if end > PAGE_SIZE {
        return Err(Error::Codec(format!(
            "{} does not fit in a {}-byte page",
            address, PAGE_SIZE
        )));
    }
    page[*cursor..end].copy_from_slice(bytes);
    *cursor = end;
    Ok(())
}

fn put_item(
    page: &mut [u8; PAGE_SIZE],
    cursor: &mut usize,
    item: &[u8],
    address: NodeAddress,
) -> Result<()> {
    if item.len() > u16::MAX as usize {
        return Err(Error::Codec(format!(
            "{} holds an item larger than {} bytes",
            address,
            u16::MAX
        )));
    }
    put_bytes(page, cursor, &(item.len() as u16).to_le_bytes(), address)?;
    put_bytes(page, cursor, item, address)
}

fn take_bytes<'p>(
    page: &'p [u8; PAGE_SIZE],
    cursor: &mut usize,
    len: usize,
    address: NodeAddress,
) -> Result<&'p [u8]> {
    let end = *cursor + len;
    if end > PAGE_SIZE {
        return Err(Error::Codec(format!("{} page truncated", address)));
    }
    let bytes = &page[*cursor..end];
    *cursor = end;
    Ok(bytes)
}

fn take_item<'p>(
    page: &'p [u8; PAGE_SIZE],
    cursor: &mut usize,
    address: NodeAddress,
) -> Result<&'p [u8]> {
    let len_bytes = take_bytes(page, cursor, 2, address)?;
    let len = u16::from_le_bytes(len_bytes.try_into().expect("2-byte slice")) as usize;
    take_bytes(page, cursor, len, address)
}
