use super::types::Direction;

pub fn parse_direction(value: &[i64]) -> Option<Direction> {
    let [dx, dy] = value else { return None };
    let dx = i32::try_from(*dx).ok()?;
    let dy = i32::try_from(*dy).ok()?;
    Direction::new(dx, dy)
}
