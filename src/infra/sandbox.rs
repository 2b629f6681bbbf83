//! In-process dungeon used by tests and the demo binary.
//!
//! Levels are plain ASCII layouts, one per depth, separated by a line holding
//! only [`LEVEL_SEPARATOR`]. The screen it renders follows the usual 24x80
//! terminal layout: message line, 21 map rows, two status lines.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, info};

use crate::infra::{AgentError, Action, Direction, Environment, MAP_HEIGHT, MAP_WIDTH, Position};
use crate::perception::{Frame, FrameCell, MAP_TOP, MESSAGE_ROW, STATUS_ROWS, TERM_COLS, color};

pub const LEVEL_SEPARATOR: &str = "~~~";

/// Searches next to a hidden door before it shows up.
const SECRET_DOOR_SEARCHES: u32 = 3;
const MORE_MARKER: &str = "--More--";
const ITEM_GLYPHS: &str = "$)[!?/=\"*%(";

/// Two floors: a corridor with a rat, then a room behind a hidden door.
pub const DEMO_LAYOUT: &str = r"
 ----------                  -------
 |........|                  |.....|
 |.@...$..+###r######        |..>..|
 |........|          ########'.....|
 |...)....|                  |.....|
 ----------                  -------
~~~

 -------
 |.<...|      -----
 |.....S######+.>.|
 |.....|      -----
 -------
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terrain {
    Stone,
    HorizontalWall,
    VerticalWall,
    Floor,
    Corridor,
    DoorClosed,
    DoorOpen,
    SecretDoor,
    StairsUp,
    StairsDown,
    Fountain,
    Trap,
}

impl Terrain {
    fn passable(self) -> bool {
        matches!(
            self,
            Terrain::Floor
                | Terrain::Corridor
                | Terrain::DoorOpen
                | Terrain::StairsUp
                | Terrain::StairsDown
                | Terrain::Fountain
                | Terrain::Trap
        )
    }

    fn is_door(self) -> bool {
        matches!(self, Terrain::DoorOpen | Terrain::DoorClosed)
    }

    fn blocks_sight(self) -> bool {
        matches!(
            self,
            Terrain::Stone
                | Terrain::HorizontalWall
                | Terrain::VerticalWall
                | Terrain::DoorClosed
                | Terrain::SecretDoor
        )
    }
}

#[derive(Debug, Clone)]
struct Monster {
    glyph: char,
    hp: i32,
}

#[derive(Debug, Clone)]
struct SandboxLevel {
    terrain: Vec<Terrain>,
    seen: Vec<bool>,
    items: HashMap<Position, char>,
    monsters: HashMap<Position, Monster>,
    searched: HashMap<Position, u32>,
    arrival: Position,
}

impl SandboxLevel {
    fn parse(number: usize, text: &str) -> Result<Self, AgentError> {
        let size = (MAP_WIDTH * MAP_HEIGHT) as usize;
        let mut level = SandboxLevel {
            terrain: vec![Terrain::Stone; size],
            seen: vec![false; size],
            items: HashMap::new(),
            monsters: HashMap::new(),
            searched: HashMap::new(),
            arrival: Position::new(0, 0),
        };
        let mut start = None;
        let mut up_stairs = None;

        let rows: Vec<&str> = text.lines().collect();
        if rows.len() > MAP_HEIGHT as usize {
            return Err(AgentError::Layout(format!(
                "level {} has {} rows, at most {} fit",
                number,
                rows.len(),
                MAP_HEIGHT
            )));
        }

        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() > MAP_WIDTH as usize {
                return Err(AgentError::Layout(format!(
                    "level {} row {} is wider than {} columns",
                    number, y, MAP_WIDTH
                )));
            }
            for (x, glyph) in row.chars().enumerate() {
                let pos = Position::new(x as i32, y as i32);
                let terrain = match glyph {
                    ' ' => Terrain::Stone,
                    '-' => Terrain::HorizontalWall,
                    '|' => Terrain::VerticalWall,
                    '.' => Terrain::Floor,
                    '#' => Terrain::Corridor,
                    '+' => Terrain::DoorClosed,
                    '\'' => Terrain::DoorOpen,
                    'S' => Terrain::SecretDoor,
                    '<' => {
                        up_stairs = Some(pos);
                        Terrain::StairsUp
                    }
                    '>' => Terrain::StairsDown,
                    '{' => Terrain::Fountain,
                    '^' => Terrain::Trap,
                    '@' => {
                        start = Some(pos);
                        Terrain::Floor
                    }
                    item if ITEM_GLYPHS.contains(item) => {
                        level.items.insert(pos, item);
                        Terrain::Floor
                    }
                    monster if monster.is_ascii_alphabetic() => {
                        let hp = if monster.is_ascii_uppercase() { 6 } else { 3 };
                        level.monsters.insert(pos, Monster { glyph: monster, hp });
                        Terrain::Floor
                    }
                    other => {
                        return Err(AgentError::Layout(format!(
                            "level {} has unknown glyph {:?} at ({}, {})",
                            number, other, x, y
                        )));
                    }
                };
                level.terrain[Self::index(pos)] = terrain;
            }
        }

        level.arrival = start.or(up_stairs).ok_or_else(|| {
            AgentError::Layout(format!("level {} has neither '@' nor '<'", number))
        })?;
        Ok(level)
    }

    fn index(pos: Position) -> usize {
        (pos.y * MAP_WIDTH + pos.x) as usize
    }

    fn terrain(&self, pos: Position) -> Terrain {
        if !pos.in_bounds() {
            return Terrain::Stone;
        }
        self.terrain[Self::index(pos)]
    }

    fn set_terrain(&mut self, pos: Position, terrain: Terrain) {
        if pos.in_bounds() {
            self.terrain[Self::index(pos)] = terrain;
        }
    }

    /// Bresenham walk; only the end points may block sight.
    fn line_clear(&self, from: Position, to: Position) -> bool {
        let (dx, dy) = ((to.x - from.x).abs(), -(to.y - from.y).abs());
        let (sx, sy) = ((to.x - from.x).signum(), (to.y - from.y).signum());
        let (mut x, mut y, mut err) = (from.x, from.y, dx + dy);
        loop {
            let here = Position::new(x, y);
            if here == to {
                return true;
            }
            if here != from && self.terrain(here).blocks_sight() {
                return false;
            }
            let doubled = 2 * err;
            if doubled >= dy {
                err += dy;
                x += sx;
            }
            if doubled <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn reveal(&mut self, center: Position, radius: i32) {
        for y in (center.y - radius)..=(center.y + radius) {
            for x in (center.x - radius)..=(center.x + radius) {
                let pos = Position::new(x, y);
                if pos.in_bounds() && self.line_clear(center, pos) {
                    self.seen[Self::index(pos)] = true;
                }
            }
        }
    }

    fn is_seen(&self, pos: Position) -> bool {
        pos.in_bounds() && self.seen[Self::index(pos)]
    }

    fn terrain_glyph(&self, pos: Position) -> Option<FrameCell> {
        let horizontal_wall_beside = || {
            [Direction::West, Direction::East]
                .into_iter()
                .any(|dir| self.terrain(pos.step(dir)) == Terrain::HorizontalWall)
        };
        let cell = match self.terrain(pos) {
            Terrain::Stone => return None,
            Terrain::HorizontalWall => FrameCell::new('-', color::GRAY),
            Terrain::VerticalWall => FrameCell::new('|', color::GRAY),
            Terrain::Floor => FrameCell::new('.', color::GRAY),
            Terrain::Corridor => FrameCell::new('#', color::GRAY),
            Terrain::DoorClosed => FrameCell::new('+', color::BROWN),
            // An open door swings perpendicular to its wall
            Terrain::DoorOpen if horizontal_wall_beside() => FrameCell::new('|', color::BROWN),
            Terrain::DoorOpen => FrameCell::new('-', color::BROWN),
            Terrain::SecretDoor if horizontal_wall_beside() => FrameCell::new('-', color::GRAY),
            Terrain::SecretDoor => FrameCell::new('|', color::GRAY),
            Terrain::StairsUp => FrameCell::new('<', color::GRAY),
            Terrain::StairsDown => FrameCell::new('>', color::GRAY),
            Terrain::Fountain => FrameCell::new('{', color::BLUE),
            Terrain::Trap => FrameCell::new('^', color::MAGENTA),
        };
        Some(cell)
    }
}

fn monster_name(glyph: char) -> &'static str {
    match glyph {
        'd' => "little dog",
        'f' => "kitten",
        'u' => "pony",
        'r' => "sewer rat",
        'x' => "grid bug",
        'e' => "floating eye",
        'c' => "cockatrice",
        'F' => "lichen",
        'h' => "dwarf",
        _ => "monster",
    }
}

fn is_pet(glyph: char) -> bool {
    matches!(glyph, 'd' | 'f' | 'u')
}

/// Session state of the in-process dungeon.
pub struct SandboxEnvironment {
    levels: Vec<SandboxLevel>,
    current: usize,
    player: Position,
    hp: i32,
    max_hp: i32,
    kills: u32,
    gold: u32,
    inventory: Vec<char>,
    turn: u64,
    max_turns: u64,
    sight_radius: i32,
    peaceful: HashSet<char>,
    messages: VecDeque<String>,
    pending_attack: Option<Position>,
    active: bool,
    ending: Option<&'static str>,
}

impl SandboxEnvironment {
    pub fn from_layout(layout: &str) -> Result<Self, AgentError> {
        let mut chunks = vec![String::new()];
        for line in layout.lines() {
            if line.trim_end() == LEVEL_SEPARATOR {
                chunks.push(String::new());
            } else if let Some(chunk) = chunks.last_mut() {
                chunk.push_str(line);
                chunk.push('\n');
            }
        }

        let levels = chunks
            .iter()
            .enumerate()
            .map(|(idx, text)| SandboxLevel::parse(idx + 1, text))
            .collect::<Result<Vec<_>, _>>()?;
        let player = levels
            .first()
            .map(|level| level.arrival)
            .ok_or_else(|| AgentError::Layout("no levels".to_string()))?;

        let mut sandbox = Self {
            levels,
            current: 0,
            player,
            hp: 16,
            max_hp: 16,
            kills: 0,
            gold: 0,
            inventory: Vec::new(),
            turn: 1,
            max_turns: 10_000,
            sight_radius: 3,
            peaceful: HashSet::new(),
            messages: VecDeque::new(),
            pending_attack: None,
            active: true,
            ending: None,
        };
        sandbox.reveal();
        info!(
            "Sandbox loaded with {} level(s), player at ({}, {})",
            sandbox.levels.len(),
            player.x,
            player.y
        );
        Ok(sandbox)
    }

    /// Monsters drawn with `glyph` will not fight back; pets swap places.
    pub fn with_peaceful(mut self, glyph: char) -> Self {
        self.peaceful.insert(glyph);
        self
    }

    pub fn player(&self) -> Position {
        self.player
    }

    pub fn depth(&self) -> i32 {
        self.current as i32 + 1
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn gold(&self) -> u32 {
        self.gold
    }

    pub fn inventory(&self) -> &[char] {
        &self.inventory
    }

    /// Why the session ended, once it has.
    pub fn ending(&self) -> Option<&'static str> {
        self.ending
    }

    pub fn monster_at(&self, pos: Position) -> Option<char> {
        self.level().monsters.get(&pos).map(|m| m.glyph)
    }

    fn level(&self) -> &SandboxLevel {
        &self.levels[self.current]
    }

    fn level_mut(&mut self) -> &mut SandboxLevel {
        &mut self.levels[self.current]
    }

    fn reveal(&mut self) {
        let (player, radius) = (self.player, self.sight_radius);
        self.level_mut().reveal(player, radius);
    }

    fn finish(&mut self, reason: &'static str) {
        info!("Sandbox session over: {} (turn {})", reason, self.turn);
        self.active = false;
        self.ending = Some(reason);
    }

    fn more_pending(&self) -> bool {
        self.message_text().ends_with(MORE_MARKER)
    }

    fn message_text(&self) -> String {
        let joined = self.messages.iter().cloned().collect::<Vec<_>>().join("  ");
        if joined.chars().count() + MORE_MARKER.len() < TERM_COLS || self.messages.len() < 2 {
            return joined;
        }
        let first = self.messages.front().cloned().unwrap_or_default();
        format!("{}{}", first, MORE_MARKER)
    }

    /// Render the current screen.
    pub fn render(&self) -> Frame {
        let mut frame = Frame::blank();
        frame.write_text(MESSAGE_ROW, &self.message_text());

        let level = self.level();
        for y in 0..MAP_HEIGHT {
            for x in 0..MAP_WIDTH {
                let pos = Position::new(x, y);
                if !level.is_seen(pos) {
                    continue;
                }
                if let Some(cell) = level.terrain_glyph(pos) {
                    frame.set_map_cell(pos, cell);
                }
                if let Some(&item) = level.items.get(&pos) {
                    let item_color = if item == '$' { color::YELLOW } else { color::CYAN };
                    frame.set_map_cell(pos, FrameCell::new(item, item_color));
                }
            }
        }

        for (pos, monster) in &level.monsters {
            if self.player.distance(pos) <= self.sight_radius && level.line_clear(self.player, *pos) {
                let monster_color = if self.peaceful.contains(&monster.glyph) {
                    color::WHITE
                } else {
                    color::RED
                };
                frame.set_map_cell(*pos, FrameCell::new(monster.glyph, monster_color));
            }
        }

        frame.set_map_cell(self.player, FrameCell::new('@', color::WHITE));
        frame.cursor = Some((self.player.y as usize + MAP_TOP, self.player.x as usize));

        frame.write_text(
            STATUS_ROWS[0],
            "Agent the Delver          St:16 Dx:14 Co:16 In:10 Wi:10 Ch:10 Neutral",
        );
        frame.write_text(
            STATUS_ROWS[1],
            &format!(
                "Dlvl:{} $:{} HP:{}({}) Pw:2(2) AC:7 Xp:{}/{} T:{}",
                self.depth(),
                self.gold,
                self.hp.max(0),
                self.max_hp,
                1 + self.kills / 3,
                self.kills,
                self.turn
            ),
        );
        frame
    }

    /// Apply one input token.
    pub fn apply(&mut self, action: Action) {
        if !self.active {
            return;
        }
        if self.more_pending() {
            self.messages.pop_front();
            return;
        }
        self.messages.clear();

        if let Some(target) = self.pending_attack.take() {
            if action == Action::Key('y') {
                self.attack(target);
                self.end_turn();
            }
            return;
        }

        match action {
            Action::Move(dir) => self.try_move(dir),
            Action::PickUp => self.pick_up(),
            Action::Search => {
                self.search();
                self.end_turn();
            }
            Action::Descend => self.descend(),
            Action::Wait => self.end_turn(),
            Action::Escape | Action::Key(_) => {}
        }
    }

    fn try_move(&mut self, dir: Direction) {
        let from = self.player;
        let to = from.step(dir);
        if !to.in_bounds() {
            return;
        }

        if dir.is_diagonal() {
            if self.level().terrain(from).is_door() {
                self.messages
                    .push_back("You can't move diagonally out of an intact doorway.".to_string());
                return;
            }
            if self.level().terrain(to).is_door() {
                self.messages
                    .push_back("You can't move diagonally into an intact doorway.".to_string());
                return;
            }
        }

        if let Some(glyph) = self.monster_at(to) {
            let name = monster_name(glyph);
            if self.peaceful.contains(&glyph) {
                if is_pet(glyph) {
                    if let Some(pet) = self.level_mut().monsters.remove(&to) {
                        self.level_mut().monsters.insert(from, pet);
                    }
                    self.player = to;
                    self.messages
                        .push_back(format!("You swap places with your {}.", name));
                    self.end_turn();
                } else {
                    self.pending_attack = Some(to);
                    self.messages
                        .push_back(format!("Really attack the {}? [yn] (n)", name));
                }
                return;
            }
            self.attack(to);
            self.end_turn();
            return;
        }

        match self.level().terrain(to) {
            Terrain::DoorClosed => {
                self.level_mut().set_terrain(to, Terrain::DoorOpen);
                self.messages.push_back("The door opens.".to_string());
                self.end_turn();
            }
            terrain if terrain.passable() => {
                self.player = to;
                if terrain == Terrain::Trap {
                    self.hp -= 2;
                    self.messages
                        .push_back("A dart shoots out at you! You are hit by a little dart.".to_string());
                }
                if let Some(item) = self.level().items.get(&to).copied() {
                    self.messages.push_back(format!("You see here {}.", item_name(item)));
                }
                self.end_turn();
            }
            _ => {}
        }
    }

    fn attack(&mut self, target: Position) {
        let Some(monster) = self.level_mut().monsters.get_mut(&target) else {
            return;
        };
        monster.hp -= 1;
        let (glyph, hp) = (monster.glyph, monster.hp);
        let name = monster_name(glyph);
        if hp <= 0 {
            self.level_mut().monsters.remove(&target);
            self.kills += 1;
            self.messages.push_back(format!("You kill the {}!", name));
        } else {
            self.messages.push_back(format!("You hit the {}.", name));
        }
    }

    fn pick_up(&mut self) {
        let here = self.player;
        match self.level_mut().items.remove(&here) {
            Some('$') => {
                self.gold += 10;
                self.messages.push_back("10 gold pieces.".to_string());
                self.end_turn();
            }
            Some(item) => {
                self.inventory.push(item);
                let letter = (b'a' + (self.inventory.len() as u8 - 1) % 26) as char;
                self.messages
                    .push_back(format!("{} - {}.", letter, item_name(item)));
                self.end_turn();
            }
            None => {
                self.messages
                    .push_back("There is nothing here to pick up.".to_string());
            }
        }
    }

    fn search(&mut self) {
        let here = self.player;
        let mut found = false;
        for neighbor in here.neighbors() {
            if self.level().terrain(neighbor) != Terrain::SecretDoor {
                continue;
            }
            let level = self.level_mut();
            let count = {
                let count = level.searched.entry(neighbor).or_insert(0);
                *count += 1;
                *count
            };
            if count >= SECRET_DOOR_SEARCHES {
                level.set_terrain(neighbor, Terrain::DoorClosed);
                found = true;
                debug!("Hidden door at ({}, {}) found", neighbor.x, neighbor.y);
            }
        }
        if found {
            self.messages.push_back("You find a hidden door.".to_string());
        }
    }

    fn descend(&mut self) {
        if self.level().terrain(self.player) != Terrain::StairsDown {
            self.messages.push_back("You can't go down here.".to_string());
            return;
        }
        if self.current + 1 >= self.levels.len() {
            self.messages
                .push_back("You escape the dungeon.".to_string());
            self.finish("escaped");
            return;
        }
        self.current += 1;
        self.player = self.level().arrival;
        info!("Sandbox descended to depth {}", self.depth());
        self.end_turn();
    }

    fn end_turn(&mut self) {
        self.turn += 1;

        let player = self.player;
        let biters: Vec<char> = self
            .level()
            .monsters
            .iter()
            .filter(|(pos, monster)| pos.is_adjacent(&player) && !self.peaceful.contains(&monster.glyph))
            .map(|(_, monster)| monster.glyph)
            .collect();
        if self.turn % 2 == 0 {
            for glyph in biters {
                self.hp -= 1;
                self.messages
                    .push_back(format!("The {} bites!", monster_name(glyph)));
            }
        }
        if self.turn % 15 == 0 && self.hp < self.max_hp {
            self.hp += 1;
        }

        if self.hp <= 0 {
            self.messages.push_back("You die...".to_string());
            self.finish("died");
        } else if self.turn >= self.max_turns {
            self.finish("out of turns");
        }
        self.reveal();
    }
}

fn item_name(item: char) -> &'static str {
    match item {
        '$' => "10 gold pieces",
        ')' => "a dagger",
        '[' => "a leather armor",
        '!' => "a murky potion",
        '?' => "a scroll labeled ELBIB YLOH",
        '/' => "an oak wand",
        '=' => "a jade ring",
        '"' => "an amulet",
        '*' => "a gray stone",
        '%' => "a food ration",
        '(' => "a bag",
        _ => "something",
    }
}

impl Environment for SandboxEnvironment {
    async fn read_frame(&mut self) -> Result<Option<Frame>, AgentError> {
        if !self.active {
            return Ok(None);
        }
        Ok(Some(self.render()))
    }

    async fn send_action(&mut self, action: Action) -> Result<(), AgentError> {
        if !self.active {
            return Err(AgentError::Environment("session has ended".to_string()));
        }
        self.apply(action);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
