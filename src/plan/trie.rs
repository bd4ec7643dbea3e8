//! Minimal distinguishing-suffix mining
//!
//! URLs are inserted reversed into a trie, so every node stands for one
//! suffix. A node is *covered* when every known URL ending in that suffix
//! needs invalidation; the shortest covered suffixes become `suffix` rules.

use std::collections::{BTreeMap, BTreeSet};

/// Patterns selected by [`mine_suffixes`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinedPatterns {
    /// Shortest suffixes matching only invalidated URLs, sorted
    pub suffixes: Vec<String>,

    /// Invalidated URLs that no suffix can isolate, sorted
    ///
    /// This happens when a longer, still-valid URL ends with the whole
    /// invalidated URL: any suffix of it would also match the longer one.
    pub literals: Vec<String>,
}

impl MinedPatterns {
    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty() && self.literals.is_empty()
    }
}

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<char, usize>,
    /// Set on nodes that spell out a whole URL; the flag says whether it needs invalidation
    terminal: Option<bool>,
    covered: bool,
}

/// Trie over reversed URLs
#[derive(Debug)]
pub struct SuffixTrie {
    nodes: Vec<Node>,
}

impl SuffixTrie {
    /// Builds the trie and derives node coverage
    ///
    /// Runs in time linear in the total length of the universe.
    pub fn build<'a, I>(universe: I, invalidated: &BTreeSet<String>) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut trie = Self {
            nodes: vec![Node::default()],
        };

        for url in universe {
            let mut current = 0;
            for ch in url.chars().rev() {
                current = trie.child_or_insert(current, ch);
            }
            if current != 0 {
                trie.nodes[current].terminal = Some(invalidated.contains(url));
            }
        }

        trie.compute_coverage();
        trie
    }

    fn child_or_insert(&mut self, parent: usize, ch: char) -> usize {
        if let Some(&child) = self.nodes[parent].children.get(&ch) {
            return child;
        }
        let child = self.nodes.len();
        self.nodes.push(Node::default());
        self.nodes[parent].children.insert(ch, child);
        child
    }

    /// Children are always allocated after their parent, so a reverse sweep
    /// over the arena is a bottom-up traversal.
    fn compute_coverage(&mut self) {
        for index in (0..self.nodes.len()).rev() {
            let children_covered = self.nodes[index]
                .children
                .values()
                .all(|&child| self.nodes[child].covered);

            let node = &self.nodes[index];
            let covered = match node.terminal {
                Some(flag) => flag && children_covered,
                None => !node.children.is_empty() && children_covered,
            };
            self.nodes[index].covered = covered;
        }
    }

    /// Collects the shortest covered suffixes, never descending below a
    /// collected node and never selecting the empty suffix
    pub fn mine(&self) -> MinedPatterns {
        let mut patterns = MinedPatterns::default();
        let mut path: Vec<char> = Vec::new();
        let mut stack: Vec<(usize, usize, char)> = self.nodes[0]
            .children
            .iter()
            .rev()
            .map(|(&ch, &child)| (child, 0, ch))
            .collect();

        while let Some((index, depth, ch)) = stack.pop() {
            path.truncate(depth);
            path.push(ch);

            let node = &self.nodes[index];
            if node.covered {
                patterns.suffixes.push(path.iter().rev().collect());
                continue;
            }

            if node.terminal == Some(true) {
                patterns.literals.push(path.iter().rev().collect());
            }

            for (&child_ch, &child) in node.children.iter().rev() {
                stack.push((child, depth + 1, child_ch));
            }
        }

        patterns.suffixes.sort();
        patterns.literals.sort();
        patterns
    }
}

/// Selects the minimal rule patterns that match exactly `invalidated` within `universe`
///
/// Invalidated URLs missing from `universe` are treated as part of it.
///
/// # Example
///
/// ```
/// use std::collections::BTreeSet;
/// use sumi_swell::plan::mine_suffixes;
///
/// let universe: BTreeSet<String> = ["/a/x.js", "/b/x.js", "/a/y.js"]
///     .iter().map(|s| s.to_string()).collect();
/// let invalidated: BTreeSet<String> = ["/a/x.js"].iter().map(|s| s.to_string()).collect();
///
/// let mined = mine_suffixes(&universe, &invalidated);
/// assert_eq!(mined.suffixes, vec!["a/x.js".to_string()]);
/// ```
pub fn mine_suffixes(universe: &BTreeSet<String>, invalidated: &BTreeSet<String>) -> MinedPatterns {
    if invalidated.is_empty() {
        return MinedPatterns::default();
    }

    let urls = universe
        .iter()
        .chain(invalidated.iter().filter(|url| !universe.contains(*url)))
        .map(String::as_str);

    SuffixTrie::build(urls, invalidated).mine()
}
