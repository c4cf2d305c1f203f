use rand::Rng;

use crate::catalog::LayerCatalog;
use crate::error::{Error, Result};
use crate::voting::{NUM_NEXT_MAPS_IN_ROTATION, REDO_VOTE_OPTION};

/// Returns the candidate map layers for a vote.
///
/// If a rotation is given, the candidates are one random skirmish layer
/// followed by the next maps in the rotation after `current_map`, wrapping
/// around to the start of the list. If no rotation is given (or
/// `current_map` is not in it, which the caller recovers from), the whole
/// candidate set is drawn randomly from the catalog instead.
///
/// The redo option is always appended as the final entry, so players can
/// vote for none of the above.
pub fn get_map_candidates<R: Rng>(
    rotation: Option<&[String]>,
    catalog: &LayerCatalog,
    current_map: &str,
    rng: &mut R,
) -> Result<Vec<String>> {
    let mut candidates = match rotation {
        Some(rotation) => {
            let current_index = rotation
                .iter()
                .position(|map| map == current_map)
                .ok_or_else(|| Error::MapNotInRotation(current_map.to_string()))?;
            let mut maps = vec![catalog.random_skirmish_layer(rng)?];
            maps.extend(next_maps_in_rotation(
                rotation,
                current_index,
                NUM_NEXT_MAPS_IN_ROTATION,
            ));
            maps
        }
        None => catalog.random_candidates(rng, NUM_NEXT_MAPS_IN_ROTATION)?,
    };
    candidates.push(REDO_VOTE_OPTION.to_string());
    Ok(candidates)
}

/// The next `count` maps after `current_index`, wrapping around to the
/// start of the rotation. The count is clamped so the slice never wraps
/// all the way around and duplicates an entry.
fn next_maps_in_rotation(rotation: &[String], current_index: usize, count: usize) -> Vec<String> {
    let count = count.min(rotation.len().saturating_sub(1));
    (1..=count)
        .map(|offset| rotation[(current_index + offset) % rotation.len()].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MapLayer;

    fn rotation() -> Vec<String> {
        ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect()
    }

    fn catalog() -> LayerCatalog {
        LayerCatalog::new(vec![
            MapLayer {
                name: "skirmish layer".to_string(),
                gamemode: "Skirmish".to_string(),
            },
            MapLayer {
                name: "random one".to_string(),
                gamemode: "AAS".to_string(),
            },
            MapLayer {
                name: "random two".to_string(),
                gamemode: "RAAS".to_string(),
            },
        ])
    }

    #[test]
    fn takes_next_maps_after_current() {
        assert_eq!(next_maps_in_rotation(&rotation(), 0, 2), vec!["b", "c"]);
        // Next two after "c".
        assert_eq!(next_maps_in_rotation(&rotation(), 2, 2), vec!["d", "e"]);
    }

    #[test]
    fn wraps_around_without_duplicating_or_skipping() {
        assert_eq!(
            next_maps_in_rotation(&rotation(), 3, 4),
            vec!["e", "a", "b", "c"]
        );
        // A count larger than the rotation is clamped so the current map
        // never reappears as a candidate.
        assert_eq!(
            next_maps_in_rotation(&rotation(), 2, 10),
            vec!["d", "e", "a", "b"]
        );
    }

    #[test]
    fn rotation_candidates_are_skirmish_then_next_maps_then_redo() {
        let mut rng = rand::thread_rng();
        let candidates =
            get_map_candidates(Some(&rotation()), &catalog(), "c", &mut rng).unwrap();
        assert_eq!(candidates[0], "skirmish layer");
        assert_eq!(&candidates[1..5], ["d", "e", "a", "b"]);
        assert_eq!(candidates.last().unwrap(), REDO_VOTE_OPTION);
    }

    #[test]
    fn unknown_current_map_is_an_error() {
        let mut rng = rand::thread_rng();
        let result = get_map_candidates(Some(&rotation()), &catalog(), "nope", &mut rng);
        assert!(matches!(result, Err(Error::MapNotInRotation(_))));
    }

    #[test]
    fn no_rotation_draws_from_catalog() {
        let mut rng = rand::thread_rng();
        let candidates = get_map_candidates(None, &catalog(), "c", &mut rng).unwrap();
        assert_eq!(candidates[0], "skirmish layer");
        assert_eq!(candidates.last().unwrap(), REDO_VOTE_OPTION);
        // Opener, both non-skirmish layers, redo.
        assert_eq!(candidates.len(), 4);
    }
}
