use tracing::debug;

/// One node of the container tree. Offsets are absolute positions in the
/// fetched prefix; the node never owns payload bytes.
#[derive(Debug, Clone)]
pub struct AtomNode {
    /// 4-byte type tag in its on-disk encoding (`©day` is `[0xA9, b'd', b'a', b'y']`).
    pub kind: [u8; 4],
    /// Total length including the 8- or 16-byte header.
    pub size: u64,
    /// Position of the atom's first header byte.
    pub offset: u64,
    /// Position of the first payload byte.
    pub data_offset: u64,
    /// Parsed children; empty for leaf atoms.
    pub children: Vec<AtomNode>,
}

impl AtomNode {
    /// Payload bytes within the buffer the node was parsed from. Empty if
    /// the node does not fit `buf`.
    pub fn payload<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        let start = self.data_offset as usize;
        let end = (self.offset + self.size) as usize;
        buf.get(start..end).unwrap_or(&[])
    }

    /// End of the atom, one past its last byte.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Printable form of the type tag for logs.
    pub fn kind_display(&self) -> String {
        fourcc(&self.kind)
    }
}

/// Printable form of a 4-byte tag. The `0xA9` prefix byte of Apple tags
/// renders as `©`, anything else non-graphic as `?`.
pub fn fourcc(kind: &[u8; 4]) -> String {
    kind.iter()
        .map(|&b| match b {
            0xA9 => '©',
            b if b.is_ascii_graphic() || b == b' ' => b as char,
            _ => '?',
        })
        .collect()
}

/// Atom types that nest children. Everything else is treated as opaque,
/// which keeps codec payloads like `mdat` from being misread as structure.
fn is_container(kind: &[u8; 4]) -> bool {
    matches!(
        kind,
        b"moov" | b"trak" | b"mdia" | b"minf" | b"stbl" | b"udta" | b"meta" | b"ilst"
    )
}

pub(crate) fn be_u32(buf: &[u8], pos: usize) -> Option<u32> {
    let bytes = buf.get(pos..pos + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn be_u64(buf: &[u8], pos: usize) -> Option<u64> {
    let hi = be_u32(buf, pos)? as u64;
    let lo = be_u32(buf, pos + 4)? as u64;
    Some(hi << 32 | lo)
}

/// Parse the top-level atom sequence of a fetched prefix.
///
/// Truncated or malformed data never fails the call: parsing stops at the
/// first bad atom on a level and returns whatever was structurally sound
/// before it. A prefix cut mid-`mdat` still yields every atom ahead of it.
pub fn parse_atoms(buf: &[u8]) -> Vec<AtomNode> {
    parse_range(buf, 0, buf.len() as u64)
}

/// Parse the sibling run in `[start, end)`. Each call owns its own cursor;
/// no state is shared across recursion.
fn parse_range(buf: &[u8], start: u64, end: u64) -> Vec<AtomNode> {
    let mut nodes = Vec::new();
    let mut cursor = start;

    while cursor + 8 <= end {
        let head = cursor as usize;
        let declared = match be_u32(buf, head) {
            Some(v) => v as u64,
            None => break,
        };
        let mut kind = [0u8; 4];
        kind.copy_from_slice(&buf[head + 4..head + 8]);

        let (size, header_len) = if declared == 1 {
            // Extended 64-bit size. Only the low 32 bits are read: fetched
            // prefixes top out at 10 MiB, far below the 4 GiB wrap.
            let Some(ext) = (cursor + 16 <= end).then(|| be_u64(buf, head + 8)).flatten() else {
                break;
            };
            (ext & 0xFFFF_FFFF, 16u64)
        } else {
            (declared, 8u64)
        };

        if size < header_len || cursor + size > end {
            // Undersized header or an atom claiming bytes past the fetched
            // range. Abandon this level; parents and prior siblings stand.
            debug!(
                kind = %fourcc(&kind),
                size,
                remaining = end - cursor,
                "malformed atom, stopping level"
            );
            break;
        }

        let data_offset = cursor + header_len;
        let children = if is_container(&kind) {
            let child_start = child_region_start(buf, &kind, data_offset, cursor + size);
            parse_range(buf, child_start, cursor + size)
        } else {
            Vec::new()
        };

        nodes.push(AtomNode {
            kind,
            size,
            offset: cursor,
            data_offset,
            children,
        });
        cursor += size;
    }

    nodes
}

/// Where a container's children begin. The only irregular case is `meta`:
/// the MP4 flavor is a full box with 4 bytes of version/flags before its
/// first child, the QuickTime flavor nests children directly. A `meta`
/// always leads with `hdlr`, so peek for that tag at both candidate spots
/// and default to the bare layout.
fn child_region_start(buf: &[u8], kind: &[u8; 4], data_offset: u64, end: u64) -> u64 {
    if kind != b"meta" {
        return data_offset;
    }
    let p = data_offset as usize;
    let avail = end.saturating_sub(data_offset) as usize;
    if avail >= 8 && &buf[p + 4..p + 8] == b"hdlr" {
        return data_offset;
    }
    if avail >= 12 && &buf[p + 8..p + 12] == b"hdlr" {
        return data_offset + 4;
    }
    data_offset
}

/// Depth-first, pre-order visit of `nodes` and every descendant.
pub fn walk<'a>(nodes: &'a [AtomNode], visit: &mut impl FnMut(&'a AtomNode)) {
    for node in nodes {
        visit(node);
        walk(&node.children, visit);
    }
}

/// First atom with the given tag, searching depth-first.
pub fn find_first<'a>(nodes: &'a [AtomNode], kind: &[u8; 4]) -> Option<&'a AtomNode> {
    for node in nodes {
        if &node.kind == kind {
            return Some(node);
        }
        if let Some(found) = find_first(&node.children, kind) {
            return Some(found);
        }
    }
    None
}
