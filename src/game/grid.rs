use super::constants::MAX_RANDOM_PROBES;
use super::types::{Cell, Direction};
use rand::Rng;
use std::collections::HashSet;

/// Toroidal board dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
  pub width: i32,
  pub height: i32,
}

impl Grid {
  pub fn new(width: i32, height: i32) -> Self {
    Self { width, height }
  }

  pub fn cell_count(&self) -> usize {
    self.width.max(0) as usize * self.height.max(0) as usize
  }

  pub fn wrap(&self, x: i32, y: i32) -> Cell {
    Cell::new(x.rem_euclid(self.width), y.rem_euclid(self.height))
  }

  pub fn step(&self, cell: Cell, direction: Direction) -> Cell {
    self.wrap(cell.x + direction.dx(), cell.y + direction.dy())
  }

  pub fn random_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Cell {
    Cell::new(rng.gen_range(0..self.width), rng.gen_range(0..self.height))
  }

  /// Random probing first, then a row-major scan. When every cell is taken the
  /// result is an arbitrary random cell and will collide.
  pub fn find_empty_cell<R: Rng + ?Sized>(&self, rng: &mut R, occupied: &HashSet<Cell>) -> Cell {
    for _ in 0..MAX_RANDOM_PROBES {
      let cell = self.random_cell(rng);
      if !occupied.contains(&cell) {
        return cell;
      }
    }

    for y in 0..self.height {
      for x in 0..self.width {
        let cell = Cell::new(x, y);
        if !occupied.contains(&cell) {
          return cell;
        }
      }
    }

    self.random_cell(rng)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  #[test]
  fn wrap_is_toroidal_in_both_axes() {
    let grid = Grid::new(40, 30);
    assert_eq!(grid.wrap(40, 0), Cell::new(0, 0));
    assert_eq!(grid.wrap(-1, 0), Cell::new(39, 0));
    assert_eq!(grid.wrap(5, 30), Cell::new(5, 0));
    assert_eq!(grid.wrap(5, -1), Cell::new(5, 29));
    assert_eq!(grid.wrap(-41, -31), Cell::new(39, 29));
  }

  #[test]
  fn diagonal_step_wraps_corner() {
    let grid = Grid::new(10, 10);
    let next = grid.step(Cell::new(9, 9), Direction::new(1, 1).unwrap());
    assert_eq!(next, Cell::new(0, 0));
  }

  #[test]
  fn find_empty_cell_falls_back_to_scan_on_crowded_board() {
    let grid = Grid::new(8, 8);
    let mut occupied: HashSet<Cell> = (0..8)
      .flat_map(|y| (0..8).map(move |x| Cell::new(x, y)))
      .collect();
    occupied.remove(&Cell::new(6, 7));
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
      assert_eq!(grid.find_empty_cell(&mut rng, &occupied), Cell::new(6, 7));
    }
  }

  #[test]
  fn find_empty_cell_returns_in_bounds_cell_on_full_board() {
    let grid = Grid::new(3, 2);
    let occupied: HashSet<Cell> = (0..2)
      .flat_map(|y| (0..3).map(move |x| Cell::new(x, y)))
      .collect();
    let mut rng = StdRng::seed_from_u64(1);
    let cell = grid.find_empty_cell(&mut rng, &occupied);
    assert!(occupied.contains(&cell));
  }

  #[test]
  fn find_empty_cell_never_returns_occupied_when_space_exists() {
    let grid = Grid::new(5, 5);
    let occupied: HashSet<Cell> = [Cell::new(0, 0), Cell::new(1, 1), Cell::new(2, 2)]
      .into_iter()
      .collect();
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
      assert!(!occupied.contains(&grid.find_empty_cell(&mut rng, &occupied)));
    }
  }
}
