use std::mem;

use ev_core::{Error, Xy};
use ev_graph::{ChainId, PixelChain};

use crate::pixelmap::PixelMap;

impl PixelMap {
    /// Sets an edge pixel. Already-set pixels are a no-op.
    pub fn pixel_on(&mut self, p: Xy) -> Result<(), Error> {
        self.set_pixel(p, true)
    }

    /// Clears an edge pixel. Already-clear pixels are a no-op.
    pub fn pixel_off(&mut self, p: Xy) -> Result<(), Error> {
        self.set_pixel(p, false)
    }

    pub fn pixel_toggle(&mut self, p: Xy) -> Result<(), Error> {
        if !self.grid.contains(p) {
            return Err(Error::OutOfBounds);
        }
        let p = self.grid.normalize(p);
        let on = !self.grid.is_edge(p);
        self.apply_pixel(p, on);
        Ok(())
    }

    fn set_pixel(&mut self, p: Xy, on: bool) -> Result<(), Error> {
        if !self.grid.contains(p) {
            return Err(Error::OutOfBounds);
        }
        let p = self.grid.normalize(p);
        if self.grid.is_edge(p) == on {
            return Ok(());
        }
        self.apply_pixel(p, on);
        Ok(())
    }

    fn apply_pixel(&mut self, p: Xy, on: bool) {
        self.grid.set_edge(p, on);
        self.track(&[p]);
    }

    /// Queues dirty cells, or rebuilds immediately when tracking is on.
    fn track(&mut self, cells: &[Xy]) {
        if self.auto_track {
            self.rebuild_around(cells);
        } else {
            self.pending.extend_from_slice(cells);
        }
    }

    /// Runs `f` with change tracking suspended, then rebuilds once over
    /// everything it touched. Batches nest; only the outermost commits.
    ///
    /// If `f` panics the tracking flag is still restored, but the queued
    /// cells stay pending until the next commit.
    pub fn edit_batch<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        struct Restore<'a> {
            map: &'a mut PixelMap,
            prior: bool,
        }
        impl Drop for Restore<'_> {
            fn drop(&mut self) {
                self.map.auto_track = self.prior;
            }
        }

        let prior = self.auto_track;
        self.auto_track = false;
        let guard = Restore {
            map: &mut *self,
            prior,
        };
        let out = f(guard.map);
        drop(guard);

        if self.auto_track {
            self.commit_pending();
        }
        out
    }

    /// Turning tracking back on rebuilds over everything queued while it
    /// was off.
    pub fn set_auto_track_changes(&mut self, on: bool) {
        let was = self.auto_track;
        self.auto_track = on;
        if on && !was {
            self.commit_pending();
        }
    }

    pub(crate) fn commit_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let cells = mem::take(&mut self.pending);
        self.rebuild_around(&cells);
    }

    /// Removes a chain and erases its pixels from the grid. Endpoint nodes
    /// shared with other chains survive; a node left with no chains is
    /// erased along with the rest. Returns the removed chain, or `None` for
    /// an unknown id.
    pub fn delete_chain(&mut self, id: ChainId) -> Option<PixelChain> {
        let chain = self.remove_chain_entry(id)?;

        for &p in chain.interior_pixels() {
            self.grid.set_edge(p, false);
        }
        let (a, b) = chain.endpoints();
        for p in [a, b] {
            if self.nodes.get(&p).is_some_and(|n| n.chains.is_empty()) {
                self.nodes.remove(&p);
                self.grid.set_edge(p, false);
            }
        }

        self.track(chain.pixels());
        Some(chain)
    }
}
