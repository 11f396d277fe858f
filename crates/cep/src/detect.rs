//! 패턴 유형별 탐지 알고리즘
//!
//! 모든 함수는 타임스탬프 순으로 정렬된 이벤트 뷰를 입력으로 받고,
//! 매칭된 이벤트 묶음의 목록을 반환합니다. 중복 제거와 알림 발행은
//! 엔진이 담당합니다.
//!
//! conjunction/disjunction은 `(ts - min_ts) / within` 으로 나눈 고정 버킷 단위로
//! 평가하므로, 버킷 경계를 걸친 이벤트 쌍은 매칭되지 않습니다.

use tideway_core::event::StreamEvent;

use crate::error::CepError;
use crate::pattern::{CepPattern, ConditionMatcher, PatternType, Quantifier};

/// 하나의 매칭 후보 (정렬 순서의 이벤트 참조)
pub(crate) type Candidate<'e> = Vec<&'e StreamEvent>;

/// 패턴 탐지기
pub(crate) struct Detector<'a> {
    matcher: &'a ConditionMatcher,
    default_within_ms: u64,
}

impl<'a> Detector<'a> {
    pub(crate) fn new(matcher: &'a ConditionMatcher, default_within_ms: u64) -> Self {
        Self {
            matcher,
            default_within_ms,
        }
    }

    /// 패턴 유형에 맞는 알고리즘으로 후보를 찾습니다.
    pub(crate) fn detect<'e>(
        &self,
        pattern: &CepPattern,
        events: &[&'e StreamEvent],
    ) -> Result<Vec<Candidate<'e>>, CepError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        match pattern.pattern_type {
            PatternType::Sequence | PatternType::Temporal => self.sequence(pattern, events),
            PatternType::Conjunction => self.conjunction(pattern, events),
            PatternType::Disjunction => self.disjunction(pattern, events),
            PatternType::Negation => self.negation(pattern, events),
            PatternType::Iteration => self.iteration(pattern, events),
        }
    }

    fn hit(&self, pattern: &CepPattern, idx: usize, event: &StreamEvent) -> Result<bool, CepError> {
        self.matcher.matches(pattern, idx, event)
    }

    /// 시간 제약이 없으면 무제한
    fn span_limit(pattern: &CepPattern) -> i64 {
        pattern
            .within_ms()
            .map_or(i64::MAX, |ms| i64::try_from(ms).unwrap_or(i64::MAX))
    }

    fn bucket_width(&self, pattern: &CepPattern) -> i64 {
        let ms = pattern.within_ms().unwrap_or(self.default_within_ms).max(1);
        i64::try_from(ms).unwrap_or(i64::MAX)
    }

    /// 시작 이벤트는 첫 조건을 만족해야 하고, 이후 조건은 앞으로 탐욕적으로 매칭합니다.
    /// 첫 이벤트로부터 경과 시간이 제약을 넘으면 해당 시작점을 포기합니다.
    fn sequence<'e>(
        &self,
        pattern: &CepPattern,
        events: &[&'e StreamEvent],
    ) -> Result<Vec<Candidate<'e>>, CepError> {
        let limit = Self::span_limit(pattern);
        let total = pattern.conditions.len();
        let quantifier = pattern.quantifier.unwrap_or_else(|| Quantifier::at_least(total));
        let mut found = Vec::new();

        for (i, start) in events.iter().enumerate() {
            if !self.hit(pattern, 0, start)? {
                continue;
            }
            let mut matched = vec![*start];
            let mut next = 1;
            for candidate in &events[i + 1..] {
                if next == total {
                    break;
                }
                if candidate.timestamp.saturating_sub(start.timestamp) > limit {
                    break;
                }
                if self.hit(pattern, next, candidate)? {
                    matched.push(*candidate);
                    next += 1;
                }
            }
            if next == total && quantifier.accepts(matched.len()) {
                found.push(matched);
            }
        }
        Ok(found)
    }

    /// 버킷마다 각 조건을 아직 사용되지 않은 첫 이벤트로 충족시킵니다.
    fn conjunction<'e>(
        &self,
        pattern: &CepPattern,
        events: &[&'e StreamEvent],
    ) -> Result<Vec<Candidate<'e>>, CepError> {
        let mut found = Vec::new();
        for bucket in buckets(events, self.bucket_width(pattern)) {
            let mut used = vec![false; bucket.len()];
            let mut picks = Vec::with_capacity(pattern.conditions.len());
            for idx in 0..pattern.conditions.len() {
                let mut pick = None;
                for (k, event) in bucket.iter().enumerate() {
                    if !used[k] && self.hit(pattern, idx, event)? {
                        pick = Some(k);
                        break;
                    }
                }
                match pick {
                    Some(k) => {
                        used[k] = true;
                        picks.push(k);
                    }
                    None => break,
                }
            }
            if picks.len() == pattern.conditions.len() {
                picks.sort_unstable();
                found.push(picks.into_iter().map(|k| bucket[k]).collect());
            }
        }
        Ok(found)
    }

    /// 버킷마다 선언 순서상 처음 충족되는 조건의 첫 이벤트 하나를 매칭합니다.
    fn disjunction<'e>(
        &self,
        pattern: &CepPattern,
        events: &[&'e StreamEvent],
    ) -> Result<Vec<Candidate<'e>>, CepError> {
        let mut found = Vec::new();
        'bucket: for bucket in buckets(events, self.bucket_width(pattern)) {
            for idx in 0..pattern.conditions.len() {
                for event in bucket {
                    if self.hit(pattern, idx, event)? {
                        found.push(vec![*event]);
                        continue 'bucket;
                    }
                }
            }
        }
        Ok(found)
    }

    /// 모든 양성 조건을 만족하는 이벤트 이후 `(ts, ts + within]` 구간에
    /// 부재 조건 이벤트가 없으면 매칭입니다.
    fn negation<'e>(
        &self,
        pattern: &CepPattern,
        events: &[&'e StreamEvent],
    ) -> Result<Vec<Candidate<'e>>, CepError> {
        let window = self.bucket_width(pattern);
        let (negated, positive): (Vec<usize>, Vec<usize>) =
            (0..pattern.conditions.len()).partition(|&idx| pattern.conditions[idx].negated);
        let mut found = Vec::new();

        for (i, event) in events.iter().enumerate() {
            let mut is_positive = true;
            for &idx in &positive {
                if !self.hit(pattern, idx, event)? {
                    is_positive = false;
                    break;
                }
            }
            if !is_positive {
                continue;
            }

            let deadline = event.timestamp.saturating_add(window);
            let mut violated = false;
            'scan: for later in &events[i + 1..] {
                if later.timestamp > deadline {
                    break;
                }
                if later.timestamp <= event.timestamp {
                    continue;
                }
                for &idx in &negated {
                    if self.hit(pattern, idx, later)? {
                        violated = true;
                        break 'scan;
                    }
                }
            }
            if !violated {
                found.push(vec![*event]);
            }
        }
        Ok(found)
    }

    /// 첫 조건을 연속으로 만족하는 이벤트를 최대 반복 수까지 탐욕적으로 묶습니다.
    fn iteration<'e>(
        &self,
        pattern: &CepPattern,
        events: &[&'e StreamEvent],
    ) -> Result<Vec<Candidate<'e>>, CepError> {
        let limit = Self::span_limit(pattern);
        let quantifier = pattern.quantifier.unwrap_or_default();
        let (required, upper) = (quantifier.required(), quantifier.upper());
        let mut found = Vec::new();

        for (i, start) in events.iter().enumerate() {
            if !self.hit(pattern, 0, start)? {
                continue;
            }
            let mut run = vec![*start];
            for candidate in &events[i + 1..] {
                if run.len() >= upper {
                    break;
                }
                if candidate.timestamp.saturating_sub(start.timestamp) > limit {
                    break;
                }
                if !self.hit(pattern, 0, candidate)? {
                    break;
                }
                run.push(*candidate);
            }
            if run.len() >= required {
                found.push(run);
            }
        }
        Ok(found)
    }
}

/// 정렬된 이벤트를 `(ts - min_ts) / width` 버킷으로 나눕니다.
fn buckets<'s, 'e>(
    events: &'s [&'e StreamEvent],
    width: i64,
) -> impl Iterator<Item = &'s [&'e StreamEvent]> {
    let origin = events.first().map_or(0, |e| e.timestamp);
    events.chunk_by(move |a, b| {
        a.timestamp.saturating_sub(origin) / width == b.timestamp.saturating_sub(origin) / width
    })
}
