//! Path request IDs and the search tags derived from them.

/// Identity of one submitted path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SearchTag {
    /// Request ID. Never 0; wraps after 65535.
    pub id: u16,
    /// Tag stamped on path nodes touched by the search. Unique within `era`.
    pub tag: u32,
    pub era: u32,
}

/// Hands out request IDs.
///
/// A search tag combines the 16-bit ID with a 16-bit epoch that is bumped
/// every time the ID wraps, so stale path node entries from a previous wrap
/// are never mistaken for live ones. Only when the epoch itself wraps does
/// the era change, which makes every handler reset its node entries once.
#[derive(Debug)]
pub struct PathIdAllocator {
    next_id: u16,
    epoch: u16,
    era: u32,
}

impl Default for PathIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PathIdAllocator {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            epoch: 0,
            era: 0,
        }
    }

    pub fn next(&mut self) -> SearchTag {
        let id = self.next_id;
        let tag = SearchTag {
            id,
            tag: ((self.epoch as u32) << 16) | id as u32,
            era: self.era,
        };
        self.next_id = id.wrapping_add(1);
        if self.next_id == 0 {
            self.next_id = 1;
            self.epoch = self.epoch.wrapping_add(1);
            log::debug!("path id wrapped, search tag epoch is now {}", self.epoch);
            if self.epoch == 0 {
                self.era += 1;
                log::debug!("search tag epoch wrapped, entering era {}", self.era);
            }
        }
        tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_skip_zero_and_bump_epoch() {
        let mut a = PathIdAllocator::new();
        let first = a.next();
        assert_eq!(first.id, 1);
        for _ in 2..u16::MAX {
            a.next();
        }
        let last = a.next();
        assert_eq!(last.id, u16::MAX);
        let wrapped = a.next();
        assert_eq!(wrapped.id, 1);
        assert_ne!(wrapped.tag, first.tag);
        assert_eq!(wrapped.era, first.era);
    }

    #[test]
    fn epoch_wrap_changes_era() {
        let mut a = PathIdAllocator {
            next_id: u16::MAX,
            epoch: u16::MAX,
            era: 3,
        };
        assert_eq!(a.next().era, 3);
        let t = a.next();
        assert_eq!((t.id, t.tag, t.era), (1, 1, 4));
    }
}
