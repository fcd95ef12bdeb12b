use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub type GameId = i64;

/// One side of a game.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum BracketSlot {
    /// A concrete team, by team id.
    Team(i64),
    /// A structural bye: this side will never be filled.
    Bye,
    /// Waiting on the result of a feeding game.
    Empty,
}

#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum BracketRound {
    Winners(u32),
    Losers(u32),
    GrandFinal,
}

impl std::fmt::Display for BracketRound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BracketRound::Winners(r) => write!(f, "Winners Round {}", r),
            BracketRound::Losers(r) => write!(f, "Losers Round {}", r),
            BracketRound::GrandFinal => write!(f, "Grand Final"),
        }
    }
}

/// A single slot in the elimination tree. `winner_to`/`loser_to` name the game
/// and side that receive this game's winner and loser.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub round: BracketRound,
    pub index: u32,
    pub slots: [BracketSlot; 2],
    pub winner: Option<i64>,
    pub winner_to: Option<(GameId, usize)>,
    pub loser_to: Option<(GameId, usize)>,
}

/// A full double-elimination bracket: a winners tree and a losers tree joined
/// at a single grand final. Byes are resolved at generation time.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Bracket {
    pub games: Vec<Game>,
    pub team_count: usize,
}

/// Standard seed layout for a bracket of `m = 2^k` slots: seed 1 meets seed m
/// in round one, the top two seeds land in opposite halves, and so on down.
/// Returns 1-based seed numbers in slot order.
fn seed_order(m: usize) -> Vec<usize> {
    let mut order = vec![1usize];
    while order.len() < m {
        let len = order.len() * 2;
        let mut next = Vec::with_capacity(len);
        for &s in &order {
            next.push(s);
            next.push(len + 1 - s);
        }
        order = next;
    }
    order
}

/// Number of games in losers round `lr` for a winners tree of `m` slots.
/// Odd rounds pair losers-bracket survivors, even ("major") rounds merge in
/// the losers dropping from the winners bracket.
fn losers_round_games(m: usize, lr: u32) -> usize {
    if lr % 2 == 0 {
        m >> (lr / 2 + 1)
    } else {
        m >> (lr / 2 + 2)
    }
}

impl Bracket {
    /// Build a bracket from teams in seed order (seed 1 first). The team list
    /// is padded to the next power of two with byes, which are resolved
    /// immediately: seeded teams advance past them at generation time.
    pub fn generate(seeds: &[i64]) -> Result<Bracket, Error> {
        let n = seeds.len();
        if n < 2 {
            return Err(Error::NotEnoughTeams(n));
        }
        let mut seen = HashSet::new();
        for &team in seeds {
            if !seen.insert(team) {
                return Err(Error::DuplicateTeam(team));
            }
        }

        let m = n.next_power_of_two();
        let k = m.trailing_zeros();

        let mut games: Vec<Game> = Vec::new();
        let mut ids: HashMap<(BracketRound, u32), GameId> = HashMap::new();
        let mut add_game = |games: &mut Vec<Game>, round: BracketRound, index: u32| {
            let id = games.len() as GameId + 1;
            ids.insert((round, index), id);
            games.push(Game {
                id,
                round,
                index,
                slots: [BracketSlot::Empty, BracketSlot::Empty],
                winner: None,
                winner_to: None,
                loser_to: None,
            });
        };

        for r in 1..=k {
            for i in 0..(m >> r) as u32 {
                add_game(&mut games, BracketRound::Winners(r), i);
            }
        }
        if k >= 2 {
            for lr in 1..=2 * (k - 1) {
                for i in 0..losers_round_games(m, lr) as u32 {
                    add_game(&mut games, BracketRound::Losers(lr), i);
                }
            }
        }
        add_game(&mut games, BracketRound::GrandFinal, 0);

        let id_of = |round: BracketRound, index: u32| ids[&(round, index)];
        let grand_final = id_of(BracketRound::GrandFinal, 0);
        let last_losers = 2 * (k.max(1) - 1);

        for game in games.iter_mut() {
            let i = game.index;
            match game.round {
                BracketRound::Winners(r) if r < k => {
                    game.winner_to = Some((id_of(BracketRound::Winners(r + 1), i / 2), (i % 2) as usize));
                }
                BracketRound::Winners(_) => {
                    game.winner_to = Some((grand_final, 0));
                }
                BracketRound::Losers(lr) if lr < last_losers => {
                    game.winner_to = if lr % 2 == 1 {
                        // minor round: survivor keeps its lane into the merge round
                        Some((id_of(BracketRound::Losers(lr + 1), i), 0))
                    } else {
                        Some((id_of(BracketRound::Losers(lr + 1), i / 2), (i % 2) as usize))
                    };
                }
                BracketRound::Losers(_) => {
                    game.winner_to = Some((grand_final, 1));
                }
                BracketRound::GrandFinal => {}
            }
            match game.round {
                BracketRound::Winners(1) if k >= 2 => {
                    game.loser_to = Some((id_of(BracketRound::Losers(1), i / 2), (i % 2) as usize));
                }
                BracketRound::Winners(1) => {
                    // two-team bracket: the winners final loser gets its rematch
                    game.loser_to = Some((grand_final, 1));
                }
                BracketRound::Winners(r) => {
                    let target = 2 * (r - 1);
                    let count = losers_round_games(m, target) as u32;
                    // reverse the drop-down order on alternating rounds to
                    // postpone rematches between teams that already met
                    let index = if r % 2 == 0 { count - 1 - i } else { i };
                    game.loser_to = Some((id_of(BracketRound::Losers(target), index), 1));
                }
                _ => {}
            }
        }

        let order = seed_order(m);
        for (slot, &seed_no) in order.iter().enumerate() {
            let value = if seed_no <= n {
                BracketSlot::Team(seeds[seed_no - 1])
            } else {
                BracketSlot::Bye
            };
            let game = id_of(BracketRound::Winners(1), slot as u32 / 2);
            let idx = games.iter().position(|g| g.id == game).unwrap();
            games[idx].slots[slot % 2] = value;
        }

        let mut bracket = Bracket { games, team_count: n };
        bracket.resolve_byes();
        Ok(bracket)
    }

    pub fn game(&self, id: GameId) -> Option<&Game> {
        self.games.iter().find(|g| g.id == id)
    }

    fn position(&self, id: GameId) -> Result<usize, Error> {
        self.games
            .iter()
            .position(|g| g.id == id)
            .ok_or(Error::UnknownGame(id))
    }

    /// Write `value` into slot `slot` of game `id`. Returns whether the slot
    /// actually changed, so bye resolution can detect its fixpoint.
    fn set_slot(&mut self, id: GameId, slot: usize, value: BracketSlot) -> bool {
        if let Some(game) = self.games.iter_mut().find(|g| g.id == id) {
            if game.slots[slot] != value {
                game.slots[slot] = value;
                return true;
            }
        }
        false
    }

    /// Auto-advance every game that has a bye on one side, looping until no
    /// slot changes. A game with byes on both sides forwards a bye.
    fn resolve_byes(&mut self) {
        loop {
            let mut changed = false;
            for gi in 0..self.games.len() {
                let game = &self.games[gi];
                if game.winner.is_some() {
                    continue;
                }
                let (winner_to, loser_to) = (game.winner_to, game.loser_to);
                match (game.slots[0], game.slots[1]) {
                    (BracketSlot::Team(team), BracketSlot::Bye)
                    | (BracketSlot::Bye, BracketSlot::Team(team)) => {
                        self.games[gi].winner = Some(team);
                        if let Some((id, slot)) = winner_to {
                            self.set_slot(id, slot, BracketSlot::Team(team));
                        }
                        if let Some((id, slot)) = loser_to {
                            self.set_slot(id, slot, BracketSlot::Bye);
                        }
                        changed = true;
                    }
                    (BracketSlot::Bye, BracketSlot::Bye) => {
                        if let Some((id, slot)) = winner_to {
                            changed |= self.set_slot(id, slot, BracketSlot::Bye);
                        }
                        if let Some((id, slot)) = loser_to {
                            changed |= self.set_slot(id, slot, BracketSlot::Bye);
                        }
                    }
                    _ => {}
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Record `team_id` as the winner of `game_id` and push both teams along
    /// their routing links. Re-reporting with a different team is allowed only
    /// while no downstream game has a result of its own.
    pub fn report_winner(&mut self, game_id: GameId, team_id: i64) -> Result<(), Error> {
        let gi = self.position(game_id)?;
        let game = &self.games[gi];
        let (home, away) = match (game.slots[0], game.slots[1]) {
            (BracketSlot::Team(a), BracketSlot::Team(b)) => (a, b),
            (BracketSlot::Empty, _) | (_, BracketSlot::Empty) => {
                return Err(Error::GameNotReady(game_id))
            }
            _ => return Err(Error::GameDecidedByBye(game_id)),
        };
        if team_id != home && team_id != away {
            return Err(Error::TeamNotInGame(team_id, game_id));
        }
        if let Some(previous) = game.winner {
            if previous == team_id {
                return Ok(());
            }
            for (downstream, _) in [game.winner_to, game.loser_to].into_iter().flatten() {
                if self.game(downstream).and_then(|g| g.winner).is_some() {
                    return Err(Error::GameLocked(game_id));
                }
            }
        }

        let loser = if team_id == home { away } else { home };
        let (winner_to, loser_to) = (self.games[gi].winner_to, self.games[gi].loser_to);
        self.games[gi].winner = Some(team_id);
        if let Some((id, slot)) = winner_to {
            self.set_slot(id, slot, BracketSlot::Team(team_id));
        }
        if let Some((id, slot)) = loser_to {
            self.set_slot(id, slot, BracketSlot::Team(loser));
        }
        self.resolve_byes();
        Ok(())
    }

    pub fn champion(&self) -> Option<i64> {
        self.games
            .iter()
            .find(|g| g.round == BracketRound::GrandFinal)
            .and_then(|g| g.winner)
    }

    /// Final placements for every team already eliminated, champion first.
    /// Teams knocked out in the same losers round share a placement.
    pub fn placements(&self) -> Vec<(i64, u32)> {
        let mut out = Vec::new();
        let Some(gf) = self.games.iter().find(|g| g.round == BracketRound::GrandFinal) else {
            return out;
        };
        let Some(champion) = gf.winner else {
            return out;
        };
        out.push((champion, 1));
        for slot in gf.slots {
            if let BracketSlot::Team(team) = slot {
                if team != champion {
                    out.push((team, 2));
                }
            }
        }

        let mut placed = out.len() as u32;
        let last_losers = self
            .games
            .iter()
            .filter_map(|g| match g.round {
                BracketRound::Losers(lr) => Some(lr),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        for lr in (1..=last_losers).rev() {
            let mut losers = Vec::new();
            for game in self.games.iter().filter(|g| g.round == BracketRound::Losers(lr)) {
                if let Some(winner) = game.winner {
                    for slot in game.slots {
                        if let BracketSlot::Team(team) = slot {
                            if team != winner {
                                losers.push(team);
                            }
                        }
                    }
                }
            }
            let place = placed + 1;
            for team in &losers {
                out.push((*team, place));
            }
            placed += losers.len() as u32;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_teams(game: &Game) -> (Option<i64>, Option<i64>) {
        let team = |s: BracketSlot| match s {
            BracketSlot::Team(t) => Some(t),
            _ => None,
        };
        (team(game.slots[0]), team(game.slots[1]))
    }

    fn find<'a>(bracket: &'a Bracket, round: BracketRound, index: u32) -> &'a Game {
        bracket
            .games
            .iter()
            .find(|g| g.round == round && g.index == index)
            .unwrap()
    }

    #[test]
    fn rejects_degenerate_seed_lists() {
        assert!(matches!(
            Bracket::generate(&[]),
            Err(Error::NotEnoughTeams(0))
        ));
        assert!(matches!(
            Bracket::generate(&[7]),
            Err(Error::NotEnoughTeams(1))
        ));
        assert!(matches!(
            Bracket::generate(&[1, 2, 1]),
            Err(Error::DuplicateTeam(1))
        ));
    }

    #[test]
    fn two_team_bracket_is_final_plus_rematch_slot() {
        let mut bracket = Bracket::generate(&[10, 20]).unwrap();
        assert_eq!(bracket.games.len(), 2);

        let wf = find(&bracket, BracketRound::Winners(1), 0);
        assert_eq!(slot_teams(wf), (Some(10), Some(20)));
        let wf_id = wf.id;

        bracket.report_winner(wf_id, 10).unwrap();
        let gf = find(&bracket, BracketRound::GrandFinal, 0);
        assert_eq!(slot_teams(gf), (Some(10), Some(20)));
        let gf_id = gf.id;

        bracket.report_winner(gf_id, 20).unwrap();
        assert_eq!(bracket.champion(), Some(20));
        assert_eq!(bracket.placements(), vec![(20, 1), (10, 2)]);
    }

    #[test]
    fn four_team_shape_and_seeding() {
        let bracket = Bracket::generate(&[101, 102, 103, 104]).unwrap();
        // 2m - 2 games for m teams
        assert_eq!(bracket.games.len(), 6);
        assert_eq!(
            slot_teams(find(&bracket, BracketRound::Winners(1), 0)),
            (Some(101), Some(104))
        );
        assert_eq!(
            slot_teams(find(&bracket, BracketRound::Winners(1), 1)),
            (Some(102), Some(103))
        );
        // every non-final game routes its winner, every winners game its loser
        for game in &bracket.games {
            if game.round != BracketRound::GrandFinal {
                assert!(game.winner_to.is_some(), "{:?} has no winner route", game.round);
            }
            if matches!(game.round, BracketRound::Winners(_)) {
                assert!(game.loser_to.is_some(), "{:?} has no loser route", game.round);
            }
        }
    }

    #[test]
    fn three_teams_resolve_byes_at_generation() {
        let mut bracket = Bracket::generate(&[1, 2, 3]).unwrap();

        // seed 1 had a bye and is already through to the winners final
        let wf = find(&bracket, BracketRound::Winners(2), 0);
        assert_eq!(wf.slots[0], BracketSlot::Team(1));
        assert_eq!(wf.slots[1], BracketSlot::Empty);

        // the bye side of the losers bracket is marked, not left dangling
        let lb1 = find(&bracket, BracketRound::Losers(1), 0);
        assert_eq!(lb1.slots[0], BracketSlot::Bye);

        let opener = find(&bracket, BracketRound::Winners(1), 1);
        assert_eq!(slot_teams(opener), (Some(2), Some(3)));
        let opener_id = opener.id;
        bracket.report_winner(opener_id, 2).unwrap();

        // the loser falls into a bye game and advances straight through it
        let lb2 = find(&bracket, BracketRound::Losers(2), 0);
        assert_eq!(lb2.slots[0], BracketSlot::Team(3));

        let bye_game = find(&bracket, BracketRound::Winners(1), 0);
        assert_eq!(bye_game.winner, Some(1));
        let bye_id = bye_game.id;
        assert!(matches!(
            bracket.report_winner(bye_id, 1),
            Err(Error::GameDecidedByBye(_))
        ));
    }

    #[test]
    fn six_teams_double_byes_in_losers_round_one() {
        let bracket = Bracket::generate(&[1, 2, 3, 4, 5, 6]).unwrap();
        // seeds 1 and 2 sit out round one; both losers-round-one games get a
        // bye from the winners side and wait on a single real loser each
        for index in 0..2 {
            let game = find(&bracket, BracketRound::Losers(1), index);
            assert!(
                game.slots.contains(&BracketSlot::Bye),
                "losers round 1 game {index} should carry a bye"
            );
        }
    }

    #[test]
    fn eight_team_full_run() {
        let mut bracket = Bracket::generate(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(bracket.games.len(), 14);

        let round_one: Vec<_> = (0..4)
            .map(|i| slot_teams(find(&bracket, BracketRound::Winners(1), i)))
            .collect();
        assert_eq!(
            round_one,
            vec![
                (Some(1), Some(8)),
                (Some(4), Some(5)),
                (Some(2), Some(7)),
                (Some(3), Some(6)),
            ]
        );

        // the lower team id wins every game it plays
        loop {
            let next = bracket.games.iter().find_map(|g| {
                if g.winner.is_none() {
                    if let (Some(a), Some(b)) = slot_teams(g) {
                        return Some((g.id, a.min(b)));
                    }
                }
                None
            });
            match next {
                Some((game, team)) => bracket.report_winner(game, team).unwrap(),
                None => break,
            }
        }

        assert_eq!(bracket.champion(), Some(1));

        // drop-down reversal: the winners semifinal losers cross lanes
        let lb2_a = find(&bracket, BracketRound::Losers(2), 0);
        let lb2_b = find(&bracket, BracketRound::Losers(2), 1);
        assert_eq!(lb2_a.slots[1], BracketSlot::Team(3));
        assert_eq!(lb2_b.slots[1], BracketSlot::Team(4));

        let mut placements = bracket.placements();
        placements.sort();
        assert_eq!(
            placements,
            vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 5), (7, 7), (8, 7)]
        );
    }

    #[test]
    fn sixteen_team_shape() {
        let seeds: Vec<i64> = (1..=16).collect();
        let bracket = Bracket::generate(&seeds).unwrap();
        assert_eq!(bracket.games.len(), 30);
        let losers_rounds: Vec<usize> = (1..=6)
            .map(|lr| {
                bracket
                    .games
                    .iter()
                    .filter(|g| g.round == BracketRound::Losers(lr))
                    .count()
            })
            .collect();
        assert_eq!(losers_rounds, vec![4, 4, 2, 2, 1, 1]);
    }

    #[test]
    fn report_winner_rejects_bad_input() {
        let mut bracket = Bracket::generate(&[1, 2, 3, 4]).unwrap();
        assert!(matches!(
            bracket.report_winner(999, 1),
            Err(Error::UnknownGame(999))
        ));

        let opener = find(&bracket, BracketRound::Winners(1), 0).id;
        assert!(matches!(
            bracket.report_winner(opener, 3),
            Err(Error::TeamNotInGame(3, _))
        ));

        let semifinal = find(&bracket, BracketRound::Winners(2), 0).id;
        assert!(matches!(
            bracket.report_winner(semifinal, 1),
            Err(Error::GameNotReady(_))
        ));
    }

    #[test]
    fn corrections_allowed_until_downstream_decides() {
        let mut bracket = Bracket::generate(&[1, 2, 3, 4]).unwrap();
        let opener = find(&bracket, BracketRound::Winners(1), 0).id;
        let other = find(&bracket, BracketRound::Winners(1), 1).id;

        bracket.report_winner(opener, 1).unwrap();
        // correcting flips both the semifinal slot and the losers slot
        bracket.report_winner(opener, 4).unwrap();
        let semifinal = find(&bracket, BracketRound::Winners(2), 0);
        assert_eq!(semifinal.slots[0], BracketSlot::Team(4));
        let lb1 = find(&bracket, BracketRound::Losers(1), 0);
        assert_eq!(lb1.slots[0], BracketSlot::Team(1));

        bracket.report_winner(other, 2).unwrap();
        let semifinal_id = find(&bracket, BracketRound::Winners(2), 0).id;
        bracket.report_winner(semifinal_id, 2).unwrap();
        assert!(matches!(
            bracket.report_winner(opener, 1),
            Err(Error::GameLocked(_))
        ));
        // re-reporting the same winner is a no-op, not a conflict
        bracket.report_winner(opener, 4).unwrap();
    }
}
