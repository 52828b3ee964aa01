//! Tile grid - the shared spatial state every system reads and writes

use serde::{Deserialize, Serialize};

/// Closed set of tile kinds. The power line is an overlay flag, not a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Grass,
    Road,
    Residential,
    Commercial,
    Industrial,
    PowerPlant,
    Police,
    FireStation,
}

impl TileKind {
    pub const ALL: [TileKind; 8] = [
        TileKind::Grass,
        TileKind::Road,
        TileKind::Residential,
        TileKind::Commercial,
        TileKind::Industrial,
        TileKind::PowerPlant,
        TileKind::Police,
        TileKind::FireStation,
    ];

    /// Residential, commercial or industrial zone.
    pub fn is_zone(self) -> bool {
        matches!(
            self,
            TileKind::Residential | TileKind::Commercial | TileKind::Industrial
        )
    }

    /// Anything that counts as a structure for decay and collapse.
    pub fn is_building(self) -> bool {
        !matches!(self, TileKind::Grass | TileKind::Road)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TileKind::Grass => "grass",
            TileKind::Road => "road",
            TileKind::Residential => "residential",
            TileKind::Commercial => "commercial",
            TileKind::Industrial => "industrial",
            TileKind::PowerPlant => "power_plant",
            TileKind::Police => "police",
            TileKind::FireStation => "fire_station",
        }
    }
}

/// Tile position in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: TilePos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn euclidean(self, other: TilePos) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub pos: TilePos,
    pub kind: TileKind,
    pub has_power_line: bool,
    pub is_powered: bool,
    pub population: u8,
    pub land_value: u8,
    pub crime_level: f64,
    pub is_on_fire: bool,
    pub fire_intensity: f64,
    pub is_burned: bool,
    pub building_health: f64,
}

impl Tile {
    pub fn new(pos: TilePos) -> Self {
        Self {
            pos,
            kind: TileKind::Grass,
            has_power_line: false,
            is_powered: false,
            population: 0,
            land_value: 50,
            crime_level: 0.0,
            is_on_fire: false,
            fire_intensity: 0.0,
            is_burned: false,
            building_health: 1.0,
        }
    }

    /// True when the tile carries state worth persisting.
    pub fn is_default(&self) -> bool {
        self.kind == TileKind::Grass
            && !self.has_power_line
            && self.population == 0
            && !self.is_on_fire
            && !self.is_burned
            && self.building_health >= 1.0
    }

    /// Collapse into rubble. Shared by fire destruction and structural decay.
    pub(crate) fn collapse(&mut self) {
        self.is_burned = true;
        self.is_on_fire = false;
        self.fire_intensity = 0.0;
        self.building_health = 0.0;
        self.population = 0;
    }

    fn reset_state(&mut self) {
        self.is_powered = false;
        self.population = 0;
        self.is_on_fire = false;
        self.fire_intensity = 0.0;
        self.is_burned = false;
        self.building_health = 1.0;
    }
}

/// Fixed-size rectangular grid, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

impl Grid {
    /// Largest map a scenario or save may ask for.
    pub const MAX_TILES: usize = 1 << 24;

    /// Whether `width` x `height` is addressable by `TilePos` and within `MAX_TILES`.
    /// Zero-sized maps pass here and are rejected by callers with their own message.
    pub fn fits(width: usize, height: usize) -> bool {
        let addressable = width <= i32::MAX as usize && height <= i32::MAX as usize;
        addressable
            && width
                .checked_mul(height)
                .is_some_and(|count| count <= Self::MAX_TILES)
    }

    /// Callers pass dimensions already checked with [`Grid::fits`].
    pub fn new(width: usize, height: usize) -> Self {
        let mut tiles = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                tiles.push(Tile::new(TilePos::new(x as i32, y as i32)));
            }
        }
        Self {
            width,
            height,
            tiles,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some()
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    pub fn get(&self, x: i32, y: i32) -> Option<&Tile> {
        let idx = self.index(x, y)?;
        Some(&self.tiles[idx])
    }

    pub fn get_mut(&mut self, x: i32, y: i32) -> Option<&mut Tile> {
        let idx = self.index(x, y)?;
        Some(&mut self.tiles[idx])
    }

    pub fn tile(&self, pos: TilePos) -> Option<&Tile> {
        self.get(pos.x, pos.y)
    }

    pub fn tile_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        self.get_mut(pos.x, pos.y)
    }

    /// Change a tile's kind. Returns false when out of bounds, or when a
    /// non-grass kind is requested on rubble (bulldoze it first).
    pub fn set_type(&mut self, x: i32, y: i32, kind: TileKind) -> bool {
        let Some(tile) = self.get_mut(x, y) else {
            return false;
        };
        if tile.is_burned && kind != TileKind::Grass {
            return false;
        }
        tile.kind = kind;
        tile.reset_state();
        if kind == TileKind::Grass {
            tile.has_power_line = false;
        }
        true
    }

    /// Flip the power-line overlay without touching the tile kind.
    pub fn toggle_power_line(&mut self, x: i32, y: i32) -> bool {
        match self.get_mut(x, y) {
            Some(tile) => {
                tile.has_power_line = !tile.has_power_line;
                true
            }
            None => false,
        }
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }

    /// In-bounds 4-connected neighbors.
    pub fn neighbors(&self, pos: TilePos) -> impl Iterator<Item = TilePos> + '_ {
        NEIGHBOR_OFFSETS
            .iter()
            .map(move |(dx, dy)| TilePos::new(pos.x + dx, pos.y + dy))
            .filter(move |p| self.in_bounds(p.x, p.y))
    }

    /// In-bounds positions of the square window `pos ± radius`.
    pub fn window(&self, pos: TilePos, radius: i32) -> impl Iterator<Item = TilePos> + '_ {
        (-radius..=radius).flat_map(move |dy| {
            (-radius..=radius).filter_map(move |dx| {
                let p = TilePos::new(pos.x + dx, pos.y + dy);
                self.in_bounds(p.x, p.y).then_some(p)
            })
        })
    }

    pub fn positions_of(&self, kind: TileKind) -> Vec<TilePos> {
        self.tiles
            .iter()
            .filter(|tile| tile.kind == kind)
            .map(|tile| tile.pos)
            .collect()
    }

    pub fn has_adjacent(&self, pos: TilePos, kind: TileKind) -> bool {
        self.neighbors(pos)
            .any(|p| self.tile(p).is_some_and(|tile| tile.kind == kind))
    }

    pub fn total_population(&self) -> u64 {
        self.tiles.iter().map(|t| u64::from(t.population)).sum()
    }
}
