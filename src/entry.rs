use crate::arena::Arena;

/// Packed entry layout, 20 + keylen + datalen bytes:
///
/// | offset       | width   | field                                     |
/// |--------------|---------|-------------------------------------------|
/// | +0           | 4       | XOR link (prev position ^ next position)  |
/// | +4           | 4       | keylen                                    |
/// | +8           | 4       | datalen                                   |
/// | +12          | 8       | absolute expiry, seconds since the epoch  |
/// | +20          | keylen  | key bytes                                 |
/// | +20 + keylen | datalen | value bytes                               |
pub(crate) const HEADER_LEN: u32 = 20;

const LINK: u32 = 0;
const KEYLEN: u32 = 4;
const DATALEN: u32 = 8;
const EXPIRE: u32 = 12;

/// Read-only view of the entry at a given arena position.
///
/// Field reads are bounds checked by the arena, so a view over a position
/// that is not actually an entry aborts rather than misreading.
#[derive(Clone, Copy)]
pub(crate) struct EntryView<'a> {
    arena: &'a Arena,
    pos: u32,
}

impl<'a> EntryView<'a> {
    pub fn at(arena: &'a Arena, pos: u32) -> Self {
        Self { arena, pos }
    }

    pub fn link(&self) -> u32 {
        self.arena.get4(self.pos + LINK)
    }

    pub fn key_len(&self) -> u32 {
        self.arena.get4(self.pos + KEYLEN)
    }

    pub fn data_len(&self) -> u32 {
        self.arena.get4(self.pos + DATALEN)
    }

    pub fn expire(&self) -> u64 {
        self.arena.get8(self.pos + EXPIRE)
    }

    pub fn key(&self) -> &'a [u8] {
        self.arena.bytes(self.pos + HEADER_LEN, self.key_len())
    }

    pub fn value(&self) -> &'a [u8] {
        self.arena
            .bytes(self.pos + HEADER_LEN + self.key_len(), self.data_len())
    }

    /// Total packed length. Widened to u64 so that lengths read from a
    /// corrupted header cannot wrap the cursor arithmetic in eviction.
    pub fn total_len(&self) -> u64 {
        HEADER_LEN as u64 + self.key_len() as u64 + self.data_len() as u64
    }
}

/// Pack an entry at `pos`. The caller has already reserved the space and
/// computed the XOR link for the new chain head.
pub(crate) fn write(arena: &mut Arena, pos: u32, link: u32, key: &[u8], data: &[u8], expire: u64) {
    arena.set4(pos + LINK, link);
    arena.set4(pos + KEYLEN, key.len() as u32);
    arena.set4(pos + DATALEN, data.len() as u32);
    arena.set8(pos + EXPIRE, expire);
    arena.write(pos + HEADER_LEN, key);
    arena.write(pos + HEADER_LEN + key.len() as u32, data);
}
