use rand::Rng;

use crate::types::{Move, Outcome};

/// Outcome from the player's point of view.
pub fn judge(player: Move, machine: Move) -> Outcome {
    use Move::*;

    if player == Undefined || machine == Undefined {
        return Outcome::Invalid;
    }
    if player == machine {
        return Outcome::Draw;
    }

    match (player, machine) {
        (Rock, Scissors) | (Paper, Rock) | (Scissors, Paper) => Outcome::Win,
        _ => Outcome::Lose,
    }
}

pub fn random_machine_move<R: Rng + ?Sized>(rng: &mut R) -> Move {
    Move::PLAYABLE[rng.random_range(0..Move::PLAYABLE.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn table_matches_rules() {
        use Move::*;
        let cases = [
            (Rock, Rock, Outcome::Draw),
            (Rock, Paper, Outcome::Lose),
            (Rock, Scissors, Outcome::Win),
            (Paper, Rock, Outcome::Win),
            (Paper, Paper, Outcome::Draw),
            (Paper, Scissors, Outcome::Lose),
            (Scissors, Rock, Outcome::Lose),
            (Scissors, Paper, Outcome::Win),
            (Scissors, Scissors, Outcome::Draw),
        ];
        for (player, machine, expected) in cases {
            assert_eq!(judge(player, machine), expected, "{player:?} vs {machine:?}");
        }
    }

    #[test]
    fn distinct_moves_are_antisymmetric() {
        for player in Move::PLAYABLE {
            for machine in Move::PLAYABLE {
                let forward = judge(player, machine);
                let backward = judge(machine, player);
                if player == machine {
                    assert_eq!(forward, Outcome::Draw);
                } else {
                    assert!(matches!(
                        (forward, backward),
                        (Outcome::Win, Outcome::Lose) | (Outcome::Lose, Outcome::Win)
                    ));
                }
            }
        }
    }

    #[test]
    fn undefined_on_either_side_is_invalid() {
        for other in [Move::Rock, Move::Paper, Move::Scissors, Move::Undefined] {
            assert_eq!(judge(Move::Undefined, other), Outcome::Invalid);
            assert_eq!(judge(other, Move::Undefined), Outcome::Invalid);
        }
    }

    #[test]
    fn machine_move_covers_every_playable_move() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let pick = random_machine_move(&mut rng);
            let idx = Move::PLAYABLE
                .iter()
                .position(|m| *m == pick)
                .expect("machine move is playable");
            seen[idx] = true;
        }
        assert_eq!(seen, [true; 3]);
    }
}
